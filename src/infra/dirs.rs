//! Per-user directory management
//!
//! The alif configuration directory defaults to `~/.alif`, the location the
//! vendor tooling documentation points users to.
//!
//! Environment variables can override the default:
//! - `ALIF_CONFIG_DIR` - Override config directory

use std::env;
use std::path::PathBuf;

/// Environment variable name for the config directory override
pub const ENV_CONFIG_DIR: &str = "ALIF_CONFIG_DIR";

/// Hidden directory name under the home directory
const APP_DIR: &str = ".alif";

/// Directory provider for alif
#[derive(Debug, Clone)]
pub struct AlifDirs {
    config_dir: PathBuf,
}

impl AlifDirs {
    /// Create a new `AlifDirs` instance
    ///
    /// Checks environment variables first, then falls back to `~/.alif`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: Self::resolve_config_dir(),
        }
    }

    /// Use an explicit config directory
    #[must_use]
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Get the config directory path
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Get the tool configuration file path
    ///
    /// Returns the path to `config.toml` in the config directory.
    #[must_use]
    pub fn tool_config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Resolve config directory from environment or home directory
    fn resolve_config_dir() -> PathBuf {
        if let Ok(path) = env::var(ENV_CONFIG_DIR) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        dirs::home_dir()
            .map(|h| h.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
    }
}

impl Default for AlifDirs {
    fn default() -> Self {
        Self::new()
    }
}
