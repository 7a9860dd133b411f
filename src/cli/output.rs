//! Output formatting and progress indicators
//!
//! This module provides the spinner, status prefixes and the section/item
//! layout used by every command. Core code never prints; commands report
//! through [`Ui`].

use std::io::{self, BufRead, Write};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{AlifError, ErrorKind};

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// A running spinner
///
/// Cleared when dropped without an explicit outcome, so an early `?` return
/// never leaves it animating over the error message.
#[derive(Debug)]
pub struct Spinner {
    pb: Option<ProgressBar>,
    quiet: bool,
}

impl Spinner {
    /// Stop with a success line
    pub fn succeed(mut self, message: &str) {
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
        if !self.quiet {
            println!("{} {message}", status::SUCCESS);
        }
    }

    /// Stop with a failure line
    pub fn fail(mut self, message: &str) {
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
        eprintln!("{} {message}", status::ERROR);
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// User-facing reporter for one invocation
#[derive(Debug, Clone, Copy, Default)]
pub struct Ui {
    quiet: bool,
}

impl Ui {
    /// Create a reporter; `quiet` hides everything but errors
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// Whether output is suppressed
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Section title
    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("\n{title}");
            println!("{}", "─".repeat(title.chars().count()));
        }
    }

    /// Labelled value within a section
    pub fn item(&self, label: &str, value: impl std::fmt::Display) {
        if !self.quiet {
            println!("  {label:<12} {value}");
        }
    }

    /// Success line
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {message}", status::SUCCESS);
        }
    }

    /// Warning line, on stderr
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {message}", status::WARNING);
        }
    }

    /// Informational line
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{} {message}", status::INFO);
        }
    }

    /// Raw tool output
    pub fn block(&self, text: &str) {
        if !self.quiet && !text.trim().is_empty() {
            println!("{}", text.trim_end());
        }
    }

    /// Start a spinner; hidden when quiet
    pub fn spinner(&self, message: &str) -> Spinner {
        Spinner {
            pb: (!self.quiet).then(|| create_spinner(message)),
            quiet: self.quiet,
        }
    }
}

/// Ask a yes/no question on stderr; anything but `y`/`yes` is a no
pub fn confirm(prompt: &str) -> io::Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt} [y/N]: ")?;
    stderr.flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Print an error, its causes and the hint for its kind
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
    if let Some(hint) = AlifError::kind_of(error).and_then(ErrorKind::hint) {
        eprintln!("{} {hint}", status::INFO);
    }
}
