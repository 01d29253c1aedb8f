use std::{io::stdout, process::ExitCode};

use color_eyre::Result;
use dalle_engine::{Error, app, cli_args, settings::ApiSettings};
use log::debug;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    pretty_env_logger::init();

    let settings = ApiSettings::from_env();
    let tokens = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned());
    match app::run(tokens, &settings, &mut stdout()).await {
        Ok(outcome) => {
            debug!("Finished: {outcome:?}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{e}");
            if let Error::MissingPrompt = e {
                println!("\n{}", cli_args::usage());
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
