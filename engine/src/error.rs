use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a single invocation can fail. All of them are fatal.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Prompt is required. Use -p or --prompt.")]
    MissingPrompt,

    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error("Missing OPENAI_API_KEY in environment.")]
    MissingApiKey,

    /// Non-success status from the generation endpoint, body kept as raw text
    #[error("OpenAI API error: {status} {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unexpected API response format")]
    UnexpectedFormat,

    #[error("Image download failed: {status}")]
    Download { status: u16 },

    #[error("Invalid inline image data: {0}")]
    InvalidImageData(#[from] base64::DecodeError),

    #[error("Failed to write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn file_write(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::FileWrite { path, source }
    }
}
