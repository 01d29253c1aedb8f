//! Turns raw command line tokens into a [`RunConfig`].
//!
//! The flags are declared with clap, but the resolution policy is more forgiving than clap's:
//! unknown flags are skipped, a value flag always swallows the following token, and an invalid
//! `--count` silently keeps the previous value. The tokens are therefore normalized first so
//! that clap only ever sees input it accepts.

use std::path::PathBuf;

use clap::{Arg, CommandFactory, Parser};
use log::debug;

use crate::error::{Error, Result};

pub const DEFAULT_OUT: &str = "outputs";
pub const DEFAULT_COUNT: u32 = 1;
pub const DEFAULT_SIZE: &str = "1024x1024";
pub const DEFAULT_MODEL: &str = "gpt-image-1.5";
pub const DEFAULT_NAME: &str = "image";

/// Generate images via OpenAI Images API
#[derive(Debug, Parser)]
#[command(
    name = "dall-e",
    override_usage = "dall-e -p \"a red fox in a snowy forest\" [options]",
    after_help = indoc::indoc! {"
        Env:
          OPENAI_API_KEY        API key (required)
    "}
)]
struct Cli {
    /// Prompt to generate
    #[arg(short, long, value_name = "text")]
    prompt: Vec<String>,

    /// Output directory
    #[arg(short, long, value_name = "dir", default_value = DEFAULT_OUT)]
    out: Vec<String>,

    /// Number of images
    #[arg(short = 'n', long, value_name = "number", default_value = "1")]
    count: Vec<String>,

    /// Image size
    #[arg(long, value_name = "size", default_value = DEFAULT_SIZE)]
    size: Vec<String>,

    /// Model name
    #[arg(long, value_name = "name", default_value = DEFAULT_MODEL)]
    model: Vec<String>,

    /// Output filename prefix
    #[arg(long, value_name = "prefix", default_value = DEFAULT_NAME)]
    name: Vec<String>,

    /// Print raw JSON response
    #[arg(long)]
    json: bool,
}

/// Everything one invocation needs to know, fixed once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub prompt: String,
    pub output_directory: PathBuf,
    pub count: u32,
    pub size: String,
    pub model: String,
    pub name_prefix: String,
    pub emit_raw_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// `-h`/`--help` was given; the caller prints [`usage`] and stops successfully.
    Help,
    Run(RunConfig),
}

/// Resolves the tokens following the program name.
pub fn resolve<I, S>(tokens: I) -> Result<Resolution>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let Some(normalized) = normalize(tokens.into_iter().map(Into::into)) else {
        return Ok(Resolution::Help);
    };
    let cli = Cli::try_parse_from(normalized)?;
    let config = cli.into_config();
    if config.prompt.is_empty() {
        return Err(Error::MissingPrompt);
    }
    Ok(Resolution::Run(config))
}

pub fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// Rewrites known flags into `--long[=value]` form and drops everything else.
/// Returns `None` as soon as a help flag shows up.
fn normalize(mut tokens: impl Iterator<Item = String>) -> Option<Vec<String>> {
    let cmd = Cli::command();
    let mut normalized = vec![cmd.get_name().to_string()];

    while let Some(token) = tokens.next() {
        if token == "-h" || token == "--help" {
            return None;
        }
        let Some((arg, long)) = find_arg(cmd.get_arguments(), &token) else {
            debug!("Ignoring unrecognized argument {token:?}");
            continue;
        };

        if arg.get_action().takes_values() {
            match tokens.next() {
                Some(value) => normalized.push(format!("--{long}={value}")),
                // a dangling prompt flag still clears the prompt
                None if long == "prompt" => normalized.push("--prompt=".into()),
                None => {}
            }
        } else {
            let flag = format!("--{long}");
            if !normalized.contains(&flag) {
                normalized.push(flag);
            }
        }
    }

    Some(normalized)
}

fn find_arg<'a>(mut args: impl Iterator<Item = &'a Arg>, token: &str) -> Option<(&'a Arg, &'a str)> {
    args.find_map(|arg| {
        let long = arg.get_long()?;
        let matches_long = token.strip_prefix("--") == Some(long);
        let matches_short = arg
            .get_short()
            .is_some_and(|short| token == format!("-{short}"));
        (matches_long || matches_short).then_some((arg, long))
    })
}

/// Positive base-10 integers only; anything else is rejected.
fn parse_count(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

fn last_non_empty(values: Vec<String>, default: &str) -> String {
    values
        .into_iter()
        .rev()
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Cli {
    fn into_config(self) -> RunConfig {
        let Cli {
            mut prompt,
            out,
            count,
            size,
            model,
            name,
            json,
        } = self;

        RunConfig {
            prompt: prompt.pop().unwrap_or_default(),
            output_directory: last_non_empty(out, DEFAULT_OUT).into(),
            count: count
                .iter()
                .filter_map(|v| parse_count(v))
                .last()
                .unwrap_or(DEFAULT_COUNT),
            size: last_non_empty(size, DEFAULT_SIZE),
            model: last_non_empty(model, DEFAULT_MODEL),
            name_prefix: last_non_empty(name, DEFAULT_NAME),
            emit_raw_json: json,
        }
    }
}
