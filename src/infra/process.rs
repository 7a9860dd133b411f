//! External process execution
//!
//! Every vendor tool (`cbuild`, `app-gen-toc`, `app-write-mram`, `JLinkExe`)
//! is run through [`ToolCommand`]: output is captured, and the child is killed
//! once its time budget runs out.

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::error::ToolError;

/// Captured result of a finished tool
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit status
    pub status: ExitStatus,
    /// stdout followed by stderr
    pub output: String,
}

impl ToolOutput {
    /// Whether the tool exited successfully
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A tool invocation under construction
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new invocation of `program` with the given time budget
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            timeout,
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run in `dir`
    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Set an environment variable for the child
    #[must_use]
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Display name of the program
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map_or_else(
                || self.program.display().to_string(),
                |n| n.to_string_lossy().to_string(),
            )
    }

    /// Arguments as passed to the child
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Run to completion, returning the output whatever the exit status
    pub async fn output(&self) -> Result<ToolOutput, ToolError> {
        let program = self.program_name();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        tracing::debug!(
            "running {} {:?} (timeout {}s)",
            self.program.display(),
            self.args,
            self.timeout.as_secs()
        );

        let child = cmd.spawn().map_err(|e| spawn_error(&program, &e))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ToolError::Spawn {
                program: program.clone(),
                error: e.to_string(),
            })?,
            Err(_) => {
                return Err(ToolError::TimedOut {
                    program,
                    secs: self.timeout.as_secs(),
                })
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        Ok(ToolOutput {
            status: output.status,
            output: text,
        })
    }

    /// Run to completion, failing on a non-zero exit status
    pub async fn run(&self) -> Result<ToolOutput, ToolError> {
        let out = self.output().await?;
        if out.success() {
            Ok(out)
        } else {
            Err(ToolError::Failed {
                program: self.program_name(),
                status: out.status.to_string(),
                output: out.output,
            })
        }
    }
}

fn spawn_error(program: &str, e: &io::Error) -> ToolError {
    if e.kind() == io::ErrorKind::NotFound {
        ToolError::NotFound {
            program: program.to_string(),
        }
    } else {
        ToolError::Spawn {
            program: program.to_string(),
            error: e.to_string(),
        }
    }
}
