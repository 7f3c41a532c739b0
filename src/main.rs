//! Boardsmith CLI - firmware builder for embedded boards
//!
//! Entry point for the boardsmith command-line application.

use anyhow::Result;
use clap::Parser;

use boardsmith::cli::output::display_error;
use boardsmith::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli.log_level();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Run the command and handle errors
    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
