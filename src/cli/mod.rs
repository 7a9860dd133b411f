//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::Parser;

use commands::{Commands, Session};

/// Alif - build, sign and flash Alif Ensemble firmware
///
/// Wraps CMSIS-Toolbox and the Alif Security Toolkit so a multi-project
/// solution can be built, signed and programmed with one command.
#[derive(Parser, Debug)]
#[command(name = "alif")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Never prompt; fail when a choice is ambiguous
    #[arg(
        long,
        global = true,
        env = "ALIF_NON_INTERACTIVE",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let Some(cmd) = self.command else {
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            return Ok(());
        };
        let session = Session::new(self.quiet, self.non_interactive, self.verbose);
        cmd.run(&session).await
    }
}
