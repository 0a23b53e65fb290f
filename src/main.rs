use std::io;
use std::process::ExitCode;

use ag::cli::{self, Cli, Context};
use ag::config::{self, EnvConfig};
use ag::logging;
use clap::Parser;
use colored::Colorize;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let dotenv = config::load_dotenv();
    logging::init(&config::log_filter_from_env());
    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded .env"),
        Ok(None) => {}
        Err(error) => tracing::warn!(%error, "ignoring unreadable .env file"),
    }

    let config = EnvConfig::from_env();
    let ctx = Context::from_config(config);
    match cli::run(cli.command, &ctx, &mut io::stdout()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", format!("Error: {error:#}").red());
            ExitCode::FAILURE
        }
    }
}
