//! Alif CLI - build, sign and flash Alif Ensemble firmware
//!
//! Entry point for the alif command-line application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use alif::cli::output::display_error;
use alif::cli::Cli;

fn log_filter(verbose: u8, quiet: bool) -> EnvFilter {
    let level = match verbose {
        0 if quiet => tracing::Level::ERROR,
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, cli.quiet))
        .with_writer(std::io::stderr)
        .with_target(false)
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
