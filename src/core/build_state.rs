//! Persisted build outcome
//!
//! After a signed build, `.alif_build_state` at the solution root records
//! the binary, the TOC package and the resolved target, one per line. A
//! later `alif flash` with no arguments resumes from it.
//!
//! The file is a cache: callers must check the recorded files still exist.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::defaults;

/// Build state errors
#[derive(Error, Debug)]
pub enum BuildStateError {
    /// No state file at the root
    #[error("No build state found at {path}. Run 'alif build --sign' first")]
    NotFound { path: PathBuf },

    /// Fewer than the two required lines
    #[error("Malformed build state at {path}: expected at least 2 lines, found {lines}")]
    Malformed { path: PathBuf, lines: usize },

    /// A recorded file no longer exists
    #[error("Build state at {state} refers to missing file {missing}. Rebuild the project")]
    Stale { state: PathBuf, missing: PathBuf },

    /// Read or write failure
    #[error("IO error for '{path}': {error}")]
    Io { path: PathBuf, error: String },
}

/// Outcome of the last successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildState {
    /// Built binary
    pub binary: PathBuf,
    /// TOC package produced by signing
    pub toc: PathBuf,
    /// Resolved target (`E7-HE` or `AE722F80F55D5LS:M55_HE`), if known
    pub target_core: Option<String>,
}

impl BuildState {
    /// Create a new state record
    pub fn new(binary: &Path, toc: &Path, target_core: Option<&str>) -> Self {
        Self {
            binary: binary.to_path_buf(),
            toc: toc.to_path_buf(),
            target_core: target_core.filter(|t| !t.is_empty()).map(str::to_string),
        }
    }

    /// State file location under `root`
    pub fn path(root: &Path) -> PathBuf {
        root.join(defaults::BUILD_STATE_FILE)
    }

    /// Write the state, replacing any previous one
    pub fn save(&self, root: &Path) -> Result<(), BuildStateError> {
        let path = Self::path(root);
        let mut content = format!("{}\n{}\n", self.binary.display(), self.toc.display());
        if let Some(core) = &self.target_core {
            content.push_str(core);
            content.push('\n');
        }
        fs::write(&path, content).map_err(|e| BuildStateError::Io {
            path: path.clone(),
            error: e.to_string(),
        })?;
        tracing::debug!("Saved build state to {}", path.display());
        Ok(())
    }

    /// Read the state
    pub fn load(root: &Path) -> Result<Self, BuildStateError> {
        let path = Self::path(root);
        if !path.is_file() {
            return Err(BuildStateError::NotFound { path });
        }
        let content = fs::read_to_string(&path).map_err(|e| BuildStateError::Io {
            path: path.clone(),
            error: e.to_string(),
        })?;

        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.len() < 2 {
            return Err(BuildStateError::Malformed {
                path,
                lines: lines.len(),
            });
        }

        Ok(Self::new(
            Path::new(lines[0]),
            Path::new(lines[1]),
            lines.get(2).copied(),
        ))
    }

    /// Load and check that both recorded files exist
    pub fn load_verified(root: &Path) -> Result<Self, BuildStateError> {
        let state = Self::load(root)?;
        for file in [&state.binary, &state.toc] {
            if !file.is_file() {
                return Err(BuildStateError::Stale {
                    state: Self::path(root),
                    missing: file.clone(),
                });
            }
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let state = BuildState::new(Path::new("a.bin"), Path::new("toc.bin"), Some("E7-HE"));
        state.save(temp.path()).unwrap();

        let loaded = BuildState::load(temp.path()).unwrap();
        assert_eq!(loaded.binary, PathBuf::from("a.bin"));
        assert_eq!(loaded.toc, PathBuf::from("toc.bin"));
        assert_eq!(loaded.target_core.as_deref(), Some("E7-HE"));
    }

    #[test]
    fn test_target_core_optional() {
        let temp = TempDir::new().unwrap();
        fs::write(BuildState::path(temp.path()), "a.bin\ntoc.bin\n").unwrap();
        let loaded = BuildState::load(temp.path()).unwrap();
        assert_eq!(loaded.target_core, None);
    }

    #[test]
    fn test_save_overwrites() {
        let temp = TempDir::new().unwrap();
        BuildState::new(Path::new("old.bin"), Path::new("old_toc.bin"), Some("E7-HP"))
            .save(temp.path())
            .unwrap();
        BuildState::new(Path::new("new.bin"), Path::new("new_toc.bin"), None)
            .save(temp.path())
            .unwrap();

        let content = fs::read_to_string(BuildState::path(temp.path())).unwrap();
        assert_eq!(content, "new.bin\nnew_toc.bin\n");
    }

    #[test]
    fn test_missing_state() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            BuildState::load(temp.path()),
            Err(BuildStateError::NotFound { .. })
        ));
    }

    #[test]
    fn test_single_line_is_malformed() {
        let temp = TempDir::new().unwrap();
        fs::write(BuildState::path(temp.path()), "a.bin\n").unwrap();
        match BuildState::load(temp.path()) {
            Err(BuildStateError::Malformed { lines, .. }) => assert_eq!(lines, 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_load_verified_rejects_missing_files() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("a.bin");
        fs::write(&bin, b"app").unwrap();
        BuildState::new(&bin, &temp.path().join("AppTocPackage.bin"), None)
            .save(temp.path())
            .unwrap();

        assert!(matches!(
            BuildState::load_verified(temp.path()),
            Err(BuildStateError::Stale { .. })
        ));
    }
}
