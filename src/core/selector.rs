//! Disambiguation between equally valid candidates
//!
//! Build contexts, signing configs and serial ports can all resolve to more
//! than one candidate. Resolution code never picks one on its own; it asks a
//! [`Selector`]. The batch implementation refuses, the interactive one asks
//! on the terminal.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::SelectError;

/// Chooses one entry from an ordered candidate list
pub trait Selector {
    /// Return the zero-based index of the chosen candidate
    ///
    /// `what` names the kind of thing being chosen ("build context").
    fn select(&self, what: &str, candidates: &[String]) -> Result<usize, SelectError>;
}

/// Never chooses; ambiguity is an error
///
/// Used for CI and any non-terminal invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchSelector;

impl Selector for BatchSelector {
    fn select(&self, what: &str, candidates: &[String]) -> Result<usize, SelectError> {
        Err(SelectError::Ambiguous {
            what: what.to_string(),
            candidates: candidates.to_vec(),
        })
    }
}

/// Numbered prompt on stderr, answer read from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct InteractiveSelector;

impl Selector for InteractiveSelector {
    fn select(&self, what: &str, candidates: &[String]) -> Result<usize, SelectError> {
        let mut stderr = io::stderr();
        let io_err = |e: io::Error| SelectError::Io {
            error: e.to_string(),
        };

        writeln!(stderr, "Multiple {what}s found:").map_err(io_err)?;
        for (i, c) in candidates.iter().enumerate() {
            writeln!(stderr, "[{}] {c}", i + 1).map_err(io_err)?;
        }
        write!(stderr, "Select {what} (enter number): ").map_err(io_err)?;
        stderr.flush().map_err(io_err)?;

        let mut input = String::new();
        io::stdin().lock().read_line(&mut input).map_err(io_err)?;
        parse_selection(&input, candidates.len())
    }
}

/// Parse a 1-based numeric answer into a zero-based index
pub fn parse_selection(input: &str, max: usize) -> Result<usize, SelectError> {
    let trimmed = input.trim();
    match trimmed.parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n - 1),
        _ => Err(SelectError::InvalidSelection {
            input: trimmed.to_string(),
            max,
        }),
    }
}

/// Pick the selector for this invocation
///
/// Interactive only when both stdin and stderr are terminals and the user
/// did not ask for batch behaviour.
pub fn selector_for(non_interactive: bool) -> Box<dyn Selector> {
    if !non_interactive && io::stdin().is_terminal() && io::stderr().is_terminal() {
        Box::new(InteractiveSelector)
    } else {
        Box::new(BatchSelector)
    }
}

/// Fixed answer, for tests and scripted use
#[derive(Debug, Clone, Copy)]
pub struct FixedSelector(pub usize);

impl Selector for FixedSelector {
    fn select(&self, _what: &str, candidates: &[String]) -> Result<usize, SelectError> {
        if self.0 < candidates.len() {
            Ok(self.0)
        } else {
            Err(SelectError::InvalidSelection {
                input: (self.0 + 1).to_string(),
                max: candidates.len(),
            })
        }
    }
}
