//! Filesystem operations
//!
//! Copy and move helpers used when staging files into the toolkit and
//! retrieving generated artifacts from it.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

fn same_file(a: &Path, b: &Path) -> bool {
    a == b
        || matches!(
            (fs::canonicalize(a), fs::canonicalize(b)),
            (Ok(x), Ok(y)) if x == y
        )
}

/// Copy `from` to `to`, creating the destination's parent directories
///
/// An existing destination is replaced. Copying a file onto itself is a
/// no-op.
pub fn copy_file(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    if same_file(from, to) {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        create_dir_all(parent)?;
    }
    if to.exists() {
        if let Err(e) = fs::remove_file(to) {
            tracing::debug!("Could not remove existing {}: {e}", to.display());
        }
    }
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| FilesystemError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            error: e.to_string(),
        })
}

/// Move `from` to `to`
///
/// Uses rename where possible and falls back to copy + delete when the two
/// paths are on different filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    if same_file(from, to) {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        create_dir_all(parent)?;
    }
    if to.exists() {
        if let Err(e) = fs::remove_file(to) {
            tracing::debug!("Could not remove existing {}: {e}", to.display());
        }
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    tracing::debug!(
        "rename {} -> {} failed, copying instead",
        from.display(),
        to.display()
    );
    copy_file(from, to)?;
    fs::remove_file(from).map_err(|e| FilesystemError::WriteFile {
        path: from.to_path_buf(),
        error: e.to_string(),
    })
}

/// Write content to a file
pub fn write_file(path: &Path, content: &str) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// SHA-256 of a file's contents, hex encoded
pub fn file_sha256(path: &Path) -> Result<String, FilesystemError> {
    let content = fs::read(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}
