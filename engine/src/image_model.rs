use serde_json::Value;

use crate::error::{Error, Result};

pub mod openai_images;
pub use openai_images::OpenAIImages;

/// The `data` entries of a generation response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    pub items: Vec<ImageItem>,
}

/// One generated image. The API is expected to fill exactly one field, but either may be
/// present or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageItem {
    pub b64_json: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource<'a> {
    /// base64 encoded PNG bytes
    Inline(&'a str),
    Remote(&'a str),
}

impl ImageItem {
    /// Each field is read on its own; a field that is missing or not a string is `None`.
    pub fn from_entry(entry: &Value) -> Self {
        let field = |name: &str| entry.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            b64_json: field("b64_json"),
            url: field("url"),
        }
    }

    /// Inline data wins when both are set. Empty strings count as absent.
    pub fn source(&self) -> Option<ImageSource<'_>> {
        present(&self.b64_json)
            .map(ImageSource::Inline)
            .or_else(|| present(&self.url).map(ImageSource::Remote))
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

impl TryFrom<&Value> for GenerationResult {
    type Error = Error;

    fn try_from(response: &Value) -> Result<Self> {
        let entries = response
            .get("data")
            .and_then(Value::as_array)
            .ok_or(Error::UnexpectedFormat)?;

        let items = entries.iter().map(ImageItem::from_entry).collect();

        Ok(Self { items })
    }
}
