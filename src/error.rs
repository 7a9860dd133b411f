//! Error types for alif
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::build_state::BuildStateError;
use crate::core::map_file::MapFileError;
use crate::core::recover::RecoverError;
use crate::core::tool_config::ToolConfigError;

/// Coarse classification of every fatal condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A file, directory or candidate was not found
    NotFound,
    /// More than one equally valid candidate and no selection available
    Ambiguous,
    /// An external tool failed or could not be run
    ToolFailure,
    /// Connected hardware does not match the resolved target
    SafetyViolation,
    /// Malformed input or filesystem failure
    Invalid,
}

impl ErrorKind {
    /// Follow-up advice printed under the error, if any
    pub fn hint(self) -> Option<&'static str> {
        match self {
            Self::Ambiguous => Some(
                "Narrow the choice with -p/-t/-c, or run without --non-interactive to pick one",
            ),
            Self::SafetyViolation => Some("Nothing was written to the device"),
            Self::NotFound | Self::ToolFailure | Self::Invalid => None,
        }
    }
}

/// Disambiguation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    /// Several candidates remain and no interactive selection is possible
    #[error("Ambiguous {what}: {} candidates match ({}). Narrow the selection or run interactively", candidates.len(), candidates.join(", "))]
    Ambiguous {
        what: String,
        candidates: Vec<String>,
    },

    /// The user entered something that is not a listed number
    #[error("Invalid selection '{input}': expected a number between 1 and {max}")]
    InvalidSelection { input: String, max: usize },

    /// Reading the selection failed
    #[error("Failed to read selection: {error}")]
    Io { error: String },
}

/// Solution discovery errors
#[derive(Error, Debug)]
pub enum SolutionError {
    /// No `*.csolution.yml` in the directory
    #[error("No .csolution.yml file found in {dir}")]
    NotFound { dir: PathBuf },

    /// Directory could not be read
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },

    /// No build descriptor for the context
    #[error("Build configuration file '{file}' not found under {root}")]
    DescriptorNotFound { file: String, root: PathBuf },

    /// Build descriptor is not valid YAML or lacks required keys
    #[error("Invalid build configuration '{path}': {error}")]
    DescriptorInvalid { path: PathBuf, error: String },

    /// No binary could be located after a build
    #[error("Could not locate built binary for context '{context}'")]
    BinaryNotFound { context: String },
}

/// Build context resolution errors
#[derive(Error, Debug)]
pub enum ContextError {
    /// Context string does not have the `<project>.<buildType>+<target>` shape
    #[error("Invalid build context '{context}': expected <project>.<build-type>+<target>")]
    Invalid { context: String },

    /// Filters removed every context
    #[error("No matching build contexts found (project filter: '{project_filter}', target filter: '{target_filter}')")]
    NoMatch {
        project_filter: String,
        target_filter: String,
    },

    /// The solution lists no contexts at all
    #[error("cbuild reported no build contexts (project filter: '{project_filter}', target filter: '{target_filter}')")]
    Empty {
        project_filter: String,
        target_filter: String,
    },

    /// Disambiguation failed
    #[error(transparent)]
    Selection(#[from] SelectError),

    /// Listing contexts failed
    #[error("Failed to list contexts")]
    Tool(#[from] ToolError),
}

/// Target (signing) configuration errors
#[derive(Error, Debug)]
pub enum TargetConfigError {
    /// Config file could not be read
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Config file is not a JSON object
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Auto-detection found nothing
    #[error("No configuration files found in auto-detect paths ({}). Please specify one with -c", searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    NotFound { searched: Vec<PathBuf> },

    /// A required embedded field is absent
    #[error("Config file '{path}' has no '{field}' field")]
    MissingField { path: PathBuf, field: String },

    /// Disambiguation failed
    #[error(transparent)]
    Selection(#[from] SelectError),
}

/// External tool invocation errors
#[derive(Error, Debug)]
pub enum ToolError {
    /// Executable not found
    #[error("'{program}' not found. Check the toolkit path (alif setup) or PATH")]
    NotFound { program: String },

    /// Process could not be started
    #[error("Failed to start '{program}': {error}")]
    Spawn { program: String, error: String },

    /// Process exited unsuccessfully; output is the tool's own text
    #[error("'{program}' failed ({status}):\n{output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },

    /// Process exceeded its time budget and was killed
    #[error("'{program}' did not finish within {secs}s and was terminated")]
    TimedOut { program: String, secs: u64 },
}

/// Toolkit device identity synchronization errors
#[derive(Error, Debug)]
pub enum DeviceSyncError {
    /// Database could not be read
    #[error("Failed to read '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Database is not valid JSON of the expected shape
    #[error("Failed to parse '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// No part number contains the identifier
    #[error("No device in '{path}' matches '{identifier}'")]
    PartNotFound { identifier: String, path: PathBuf },

    /// Global config could not be written
    #[error("Failed to write '{path}': {error}")]
    Write { path: PathBuf, error: String },
}

/// Artifact staging and signing errors
#[derive(Error, Debug)]
pub enum SignError {
    /// Toolkit path not configured
    #[error("Alif toolkit path is not configured. Run 'alif setup --toolkit <path>' first")]
    ToolkitNotConfigured,

    /// Input binary is missing
    #[error("Binary file not found: {path}")]
    BinaryNotFound { path: PathBuf },

    /// Signing config resolution failed
    #[error("Failed to resolve signing config: {0}")]
    Config(#[from] TargetConfigError),

    /// Copy/move into or out of the toolkit failed
    #[error("Failed to stage '{path}': {error}")]
    Stage { path: PathBuf, error: String },

    /// `app-gen-toc` failed
    #[error("TOC generation failed")]
    Tool(#[from] ToolError),

    /// The tool succeeded but the TOC was not produced
    #[error("TOC package was not produced at {path}")]
    TocMissing { path: PathBuf },
}

/// Flashing errors
#[derive(Error, Debug)]
pub enum FlashError {
    /// Port enumeration failed
    #[error("Failed to list serial ports: {error}")]
    PortEnumeration { error: String },

    /// No serial ports at all
    #[error("No serial ports found. Is the board connected?")]
    NoPorts,

    /// Disambiguation failed
    #[error(transparent)]
    Selection(#[from] SelectError),

    /// ISP tool config could not be updated
    #[error("Failed to update '{path}': {error}")]
    IspConfig { path: PathBuf, error: String },

    /// Connected device differs from the build target
    #[error("Connected device '{actual}' does not match target '{expected}'. Refusing to write firmware built for different silicon")]
    SafetyViolation { expected: String, actual: String },

    /// Expected identity could not be determined for verification
    #[error("Cannot determine the expected device for '{target}'. Use a part-qualified target or --no-verify")]
    UnknownExpectedDevice { target: String },

    /// Probe output did not contain an identity
    #[error("Could not read device identity from probe output:\n{output}")]
    ProbeUnreadable { output: String },

    /// Flash addresses could not be resolved
    #[error(transparent)]
    Map(#[from] MapFileError),

    /// A file required for programming is absent
    #[error("Required file not found: {path}")]
    MissingArtifact { path: PathBuf },

    /// Copy into the toolkit or script generation failed
    #[error("Failed to write '{path}': {error}")]
    Io { path: PathBuf, error: String },

    /// A required tool step failed
    #[error("{stage} failed")]
    Tool {
        stage: &'static str,
        #[source]
        source: ToolError,
    },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to copy file
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Top-level alif error type
#[derive(Error, Debug)]
pub enum AlifError {
    /// Tool configuration error
    #[error("Configuration error: {0}")]
    ToolConfig(#[from] ToolConfigError),

    /// Solution error
    #[error(transparent)]
    Solution(#[from] SolutionError),

    /// Context error
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Target config error
    #[error(transparent)]
    TargetConfig(#[from] TargetConfigError),

    /// Signing error
    #[error(transparent)]
    Sign(#[from] SignError),

    /// Flash error
    #[error(transparent)]
    Flash(#[from] FlashError),

    /// Build state error
    #[error(transparent)]
    BuildState(#[from] BuildStateError),

    /// Recovery error
    #[error(transparent)]
    Recover(#[from] RecoverError),

    /// Tool error
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}

impl AlifError {
    /// Classification of the first `AlifError` in an error chain
    pub fn kind_of(error: &anyhow::Error) -> Option<ErrorKind> {
        error
            .chain()
            .find_map(|cause| cause.downcast_ref::<AlifError>())
            .map(AlifError::kind)
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Solution(
                SolutionError::NotFound { .. }
                | SolutionError::DescriptorNotFound { .. }
                | SolutionError::BinaryNotFound { .. },
            )
            | Self::Context(ContextError::NoMatch { .. } | ContextError::Empty { .. })
            | Self::TargetConfig(TargetConfigError::NotFound { .. })
            | Self::Sign(SignError::BinaryNotFound { .. } | SignError::TocMissing { .. })
            | Self::Flash(
                FlashError::NoPorts | FlashError::Map(_) | FlashError::MissingArtifact { .. },
            )
            | Self::BuildState(
                BuildStateError::NotFound { .. } | BuildStateError::Stale { .. },
            )
            | Self::ToolConfig(ToolConfigError::NotConfigured)
            | Self::Sign(SignError::ToolkitNotConfigured)
            | Self::Recover(RecoverError::NoDevice) => ErrorKind::NotFound,
            Self::Context(ContextError::Selection(e))
            | Self::TargetConfig(TargetConfigError::Selection(e))
            | Self::Flash(FlashError::Selection(e)) => match e {
                SelectError::Ambiguous { .. } => ErrorKind::Ambiguous,
                _ => ErrorKind::Invalid,
            },
            Self::Sign(SignError::Config(TargetConfigError::NotFound { .. })) => {
                ErrorKind::NotFound
            }
            Self::Sign(SignError::Config(TargetConfigError::Selection(SelectError::Ambiguous {
                ..
            }))) => ErrorKind::Ambiguous,
            Self::Tool(_)
            | Self::Context(ContextError::Tool(_))
            | Self::Sign(SignError::Tool(_))
            | Self::Flash(FlashError::Tool { .. })
            | Self::Recover(RecoverError::Tool(_) | RecoverError::NotConnected { .. }) => {
                ErrorKind::ToolFailure
            }
            Self::Flash(FlashError::SafetyViolation { .. }) => ErrorKind::SafetyViolation,
            _ => ErrorKind::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_names_both_filters() {
        let err = ContextError::NoMatch {
            project_filter: "blinky".to_string(),
            target_filter: "E7-HP".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("blinky"));
        assert!(msg.contains("E7-HP"));
    }

    #[test]
    fn test_tool_failure_keeps_output_verbatim() {
        let err = ToolError::Failed {
            program: "app-gen-toc".to_string(),
            status: "exit status: 2".to_string(),
            output: "ERROR: key file missing\n  at cert/OEM.crt".to_string(),
        };
        assert!(err
            .to_string()
            .ends_with("ERROR: key file missing\n  at cert/OEM.crt"));
    }

    #[test]
    fn test_kind_classification() {
        let safety: AlifError = FlashError::SafetyViolation {
            expected: "AE722F80F55D5LS".to_string(),
            actual: "AE302F80F55D5LE".to_string(),
        }
        .into();
        assert_eq!(safety.kind(), ErrorKind::SafetyViolation);

        let ambiguous: AlifError = ContextError::Selection(SelectError::Ambiguous {
            what: "build context".to_string(),
            candidates: vec!["a.debug+X".to_string(), "b.debug+X".to_string()],
        })
        .into();
        assert_eq!(ambiguous.kind(), ErrorKind::Ambiguous);

        let tool: AlifError = ToolError::TimedOut {
            program: "cbuild".to_string(),
            secs: 5,
        }
        .into();
        assert_eq!(tool.kind(), ErrorKind::ToolFailure);
    }

    #[test]
    fn test_tool_output_printed_once_in_chain() {
        let err = anyhow::Error::from(AlifError::from(FlashError::Tool {
            stage: "Program",
            source: ToolError::Failed {
                program: "app-write-mram".to_string(),
                status: "exit status: 1".to_string(),
                output: "Target did not respond".to_string(),
            },
        }));
        let lines: Vec<String> = err.chain().map(ToString::to_string).collect();
        assert_eq!(lines[0], "Program failed");
        assert_eq!(
            lines
                .iter()
                .filter(|l| l.contains("Target did not respond"))
                .count(),
            1
        );
    }

    #[test]
    fn test_kind_found_behind_context() {
        let err = anyhow::Error::from(AlifError::from(ToolConfigError::NotConfigured))
            .context("Failed to load alif configuration");
        assert_eq!(AlifError::kind_of(&err), Some(ErrorKind::NotFound));

        let safety = anyhow::Error::from(AlifError::from(FlashError::SafetyViolation {
            expected: "AE722F80F55D5LS".to_string(),
            actual: "AE302F80F55D5LE".to_string(),
        }));
        let kind = AlifError::kind_of(&safety);
        assert_eq!(kind, Some(ErrorKind::SafetyViolation));
        assert!(kind.and_then(ErrorKind::hint).is_some());

        assert_eq!(AlifError::kind_of(&anyhow::anyhow!("plain")), None);
    }
}
