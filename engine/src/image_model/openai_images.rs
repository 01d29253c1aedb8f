use log::{debug, info};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{
    cli_args::RunConfig,
    error::{Error, Result},
};

#[derive(Debug, Serialize)]
pub struct GenerationRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub size: &'a str,
    pub n: u32,
}

impl<'a> From<&'a RunConfig> for GenerationRequest<'a> {
    fn from(cfg: &'a RunConfig) -> Self {
        Self {
            model: &cfg.model,
            prompt: &cfg.prompt,
            size: &cfg.size,
            n: cfg.count,
        }
    }
}

/// Client for the OpenAI Images generation endpoint.
#[derive(Clone)]
pub struct OpenAIImages {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl OpenAIImages {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            client,
        }
    }

    /// Sends exactly one generation request and returns the decoded body untouched.
    pub async fn generate(&self, request: &GenerationRequest<'_>) -> Result<Value> {
        debug!("Generation request: {request:#?}");
        info!("Requesting {} image(s) from {}", request.n, self.endpoint);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Generation response: {body}");
        Ok(serde_json::from_str(&body)?)
    }
}
