//! Tool path configuration
//!
//! Reads and writes `config.toml` in the alif config directory. The file
//! records where the Alif security toolkit, CMSIS-Toolbox, the GCC toolchain
//! and the CMSIS pack root live, plus optional subprocess time budgets.
//!
//! The configuration is loaded once per invocation and passed explicitly to
//! every component; it is only written back by `alif setup`.

use crate::config::defaults;
use crate::infra::dirs::AlifDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Tool configuration error types
#[derive(Error, Debug)]
pub enum ToolConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },

    /// Failed to write config file
    #[error("Failed to write config file '{path}': {error}")]
    WriteError { path: String, error: String },

    /// The toolkit path is required but not set
    #[error("Alif CLI not configured. Run 'alif setup --toolkit <path>' first")]
    NotConfigured,
}

/// Tool path configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Alif security toolkit root (contains `app-gen-toc`, `app-write-mram`)
    pub alif_tools_path: Option<PathBuf>,

    /// CMSIS-Toolbox `bin` directory (contains `cbuild`)
    pub cmsis_toolbox_path: Option<PathBuf>,

    /// GCC toolchain `bin` directory (contains `arm-none-eabi-gcc`)
    pub gcc_toolchain_path: Option<PathBuf>,

    /// CMSIS pack root
    pub cmsis_pack_root: Option<PathBuf>,

    /// Signing key / certificate directory
    pub signing_key_path: Option<PathBuf>,

    /// Subprocess time budgets
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Subprocess time budgets in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// `cbuild` budget
    pub build_secs: Option<u64>,

    /// `app-gen-toc` and `cbuild list` budget
    pub sign_secs: Option<u64>,

    /// Erase, verify and program budget
    pub flash_secs: Option<u64>,
}

impl ToolConfig {
    /// Load tool configuration from the config directory
    ///
    /// If the config file doesn't exist, returns default configuration.
    /// If the config file exists but is invalid, returns an error.
    pub fn load(dirs: &AlifDirs) -> Result<Self, ToolConfigError> {
        Self::load_from_path(&dirs.tool_config_path())
    }

    /// Load tool configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ToolConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ToolConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ToolConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Save tool configuration to the config directory
    pub fn save(&self, dirs: &AlifDirs) -> Result<(), ToolConfigError> {
        self.save_to_path(&dirs.tool_config_path())
    }

    /// Save tool configuration to a specific path
    ///
    /// Creates parent directories if they don't exist.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ToolConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ToolConfigError::WriteError {
                path: parent.display().to_string(),
                error: e.to_string(),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ToolConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        fs::write(path, content).map_err(|e| ToolConfigError::WriteError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Toolkit root, or [`ToolConfigError::NotConfigured`]
    pub fn toolkit(&self) -> Result<&Path, ToolConfigError> {
        self.alif_tools_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ToolConfigError::NotConfigured)
    }

    /// Effective `cbuild` time budget
    #[must_use]
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeouts
                .build_secs
                .unwrap_or(defaults::BUILD_TIMEOUT_SECS),
        )
    }

    /// Effective signing time budget
    #[must_use]
    pub fn sign_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeouts
                .sign_secs
                .unwrap_or(defaults::SIGN_TIMEOUT_SECS),
        )
    }

    /// Effective flashing time budget
    #[must_use]
    pub fn flash_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeouts
                .flash_secs
                .unwrap_or(defaults::FLASH_TIMEOUT_SECS),
        )
    }
}
