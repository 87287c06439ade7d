mod api;
mod cli;
mod config;
mod db;
mod error;
mod models;

use clap::Parser;
use cli::{App, Cli};
use colored::*;
use config::Settings;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout is reserved for the data the agent consumes.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!("Parsed command: {:?}", cli.command);

    let result = match Settings::from_env().and_then(App::new) {
        Ok(app) => app.run(cli).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {:?}", e);
            eprintln!("{} {}", "Error:".red().bold(), e.to_string().red());
            ExitCode::from(e.exit_code())
        },
    }
}
