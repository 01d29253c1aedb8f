use crate::error::{Error, Result};

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const ENDPOINT_VAR: &str = "OPENAI_IMAGES_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/images/generations";

/// Process environment, read once at startup and handed down explicitly.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub endpoint: String,
}

impl ApiSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.is_empty());
        Self {
            api_key: non_empty(API_KEY_VAR),
            endpoint: non_empty(ENDPOINT_VAR).unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
        }
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or(Error::MissingApiKey)
    }
}
