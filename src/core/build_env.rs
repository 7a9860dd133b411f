//! Toolchain environment
//!
//! `cbuild` finds the compiler and packs through its environment: the
//! CMSIS-Toolbox and GCC `bin` directories are prepended to `PATH`, and the
//! toolchain root and pack root are exported under the names CMSIS-Toolbox
//! expects.

use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use super::tool_config::ToolConfig;
use crate::config::defaults;
use crate::infra::process::ToolCommand;

/// Environment and program paths for running `cbuild`
#[derive(Debug, Clone, PartialEq)]
pub struct Toolchain {
    /// CMSIS-Toolbox `bin` directory
    pub toolbox_dir: Option<PathBuf>,
    /// GCC `bin` directory
    pub gcc_dir: Option<PathBuf>,
    /// CMSIS pack root
    pub pack_root: Option<PathBuf>,
    /// Budget for a full build
    pub build_timeout: Duration,
    /// Budget for quick queries (`cbuild list`)
    pub list_timeout: Duration,
}

impl Toolchain {
    /// Toolchain described by the tool configuration
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            toolbox_dir: config.cmsis_toolbox_path.clone(),
            gcc_dir: config.gcc_toolchain_path.clone(),
            pack_root: config.cmsis_pack_root.clone(),
            build_timeout: config.build_timeout(),
            list_timeout: config.sign_timeout(),
        }
    }

    /// Path of the `cbuild` executable
    ///
    /// Falls back to a bare `cbuild` looked up on `PATH`.
    pub fn cbuild_program(&self) -> PathBuf {
        self.toolbox_dir
            .as_ref()
            .map(|dir| dir.join("cbuild"))
            .filter(|p| p.exists())
            .unwrap_or_else(|| PathBuf::from("cbuild"))
    }

    /// `PATH` with the toolchain directories in front
    pub fn search_path(&self) -> OsString {
        let mut dirs: Vec<PathBuf> = self
            .toolbox_dir
            .iter()
            .chain(self.gcc_dir.iter())
            .filter(|p| !p.as_os_str().is_empty())
            .cloned()
            .collect();
        if let Some(existing) = env::var_os("PATH") {
            dirs.extend(env::split_paths(&existing));
        }
        env::join_paths(dirs).unwrap_or_else(|e| {
            tracing::warn!("Could not extend PATH with toolchain directories: {e}");
            env::var_os("PATH").unwrap_or_default()
        })
    }

    /// Variables exported to `cbuild`, besides `PATH`
    pub fn to_env_map(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        if let Some(gcc) = &self.gcc_dir {
            env.insert(
                defaults::GCC_TOOLCHAIN_ENV.to_string(),
                gcc.display().to_string(),
            );
        }
        if let Some(packs) = &self.pack_root {
            env.insert("CMSIS_PACK_ROOT".to_string(), packs.display().to_string());
        }
        env
    }

    /// A `cbuild` invocation with the toolchain environment applied
    pub fn cbuild(&self, timeout: Duration) -> ToolCommand {
        let mut cmd =
            ToolCommand::new(self.cbuild_program(), timeout).env("PATH", self.search_path());
        for (key, value) in self.to_env_map() {
            cmd = cmd.env(key, value);
        }
        cmd
    }
}
