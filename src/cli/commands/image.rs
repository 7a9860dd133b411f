//! CLI command implementation for `alif image` (alias `sign`)

use std::env;
use std::path::Path;

use anyhow::{bail, Result};

use super::{sign_with_progress, Session, SignJob};
use crate::error::{AlifError, SignError};

/// Execute the image command
///
/// The binary's own directory is both the configuration search root and the
/// destination of the signed artifacts.
pub async fn execute(session: &Session, binary: &Path, config_file: Option<&Path>) -> Result<()> {
    let binary = env::current_dir()?.join(binary);
    if !binary.is_file() {
        return Err(AlifError::from(SignError::BinaryNotFound { path: binary }).into());
    }
    let config = session.load_config()?;
    config.toolkit().map_err(AlifError::from)?;

    let Some(work_dir) = binary.parent() else {
        bail!("Cannot determine the directory of {}", binary.display());
    };

    session.ui.header("Create Bootable Image");
    session.ui.item("Binary", binary.display());
    let outcome = sign_with_progress(
        session,
        &config,
        &SignJob {
            project_dir: work_dir,
            build_dir: work_dir,
            binary: &binary,
            core_hint: None,
            project_hint: None,
            config: config_file,
            target_core: None,
        },
    )
    .await?;

    let name = outcome
        .toc
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().to_string());
    session
        .ui
        .success(&format!("Image created successfully: {name}"));
    Ok(())
}
