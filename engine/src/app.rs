use std::{io::Write, path::PathBuf};

use log::info;
use reqwest::Client;

use crate::{
    cli_args::{self, Resolution},
    error::Result,
    image_model::{OpenAIImages, openai_images::GenerationRequest},
    save_images::Materializer,
    settings::ApiSettings,
};

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Help,
    Saved(Vec<PathBuf>),
}

/// One full invocation: resolve the arguments, request the images and save them.
///
/// Regular output (usage, the raw JSON echo and one `Saved:` line per file) goes to `out`.
/// Nothing here exits the process; the caller decides what an
/// [`Error`](crate::error::Error) means.
pub async fn run<I, S>(tokens: I, settings: &ApiSettings, out: &mut impl Write) -> Result<Outcome>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let cfg = match cli_args::resolve(tokens)? {
        Resolution::Help => {
            writeln!(out, "{}", cli_args::usage())?;
            return Ok(Outcome::Help);
        }
        Resolution::Run(cfg) => cfg,
    };
    let api_key = settings.require_api_key()?;

    let client = Client::new();
    let api = OpenAIImages::new(api_key, &settings.endpoint, client.clone());
    let response = api.generate(&GenerationRequest::from(&cfg)).await?;

    if cfg.emit_raw_json {
        writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
    }

    let materializer = Materializer::new(client, &cfg.output_directory, &cfg.name_prefix);
    let saved = materializer.save_all(&response).await?;
    info!("Saved {} of {} requested image(s)", saved.len(), cfg.count);

    for path in &saved {
        writeln!(out, "Saved: {}", path.display())?;
    }

    Ok(Outcome::Saved(saved))
}
