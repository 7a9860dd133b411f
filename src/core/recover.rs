//! Boot signature recovery over J-Link
//!
//! A device whose application crashes early can lock out ISP. Zeroing the
//! first words at every place a TOC or image header may live makes the ROM
//! bootloader fall back to ISP mode on the next power cycle.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use walkdir::WalkDir;

use super::build_state::BuildState;
use super::flash::jlink_program;
use super::map_file::PackageMap;
use crate::config::defaults;
use crate::error::ToolError;
use crate::infra::filesystem;
use crate::infra::process::ToolCommand;

const CONNECTED_MARKER: &str = "Connected successfully";

/// Recovery errors
#[derive(Error, Debug)]
pub enum RecoverError {
    /// No device name given and none derivable
    #[error("No J-Link device name. Pass one with -d (e.g. AE722F80F55D5LS_M55_HE)")]
    NoDevice,

    /// The command script could not be written
    #[error("Failed to write recovery script '{path}': {error}")]
    Script { path: PathBuf, error: String },

    /// J-Link could not be run
    #[error("J-Link failed")]
    Tool(#[from] ToolError),

    /// J-Link ran but never reached the target
    #[error("J-Link did not connect to the target. Check wiring, power and the device name.\n{output}")]
    NotConnected { output: String },
}

/// J-Link device name for a target core (`PART:CORE` becomes `PART_CORE`)
pub fn device_from_target(target_core: &str) -> Option<String> {
    let (part, core) = target_core.split_once(':')?;
    let (part, core) = (part.trim(), core.trim());
    (!part.is_empty() && !core.is_empty()).then(|| format!("{part}_{core}"))
}

/// Device to recover: the explicit name, else the one recorded by the last build
pub fn resolve_device(explicit: Option<&str>, solution_root: &Path) -> Result<String, RecoverError> {
    if let Some(device) = explicit.map(str::trim).filter(|d| !d.is_empty()) {
        return Ok(device.to_string());
    }
    BuildState::load(solution_root)
        .ok()
        .and_then(|state| state.target_core)
        .and_then(|core| device_from_target(&core))
        .ok_or(RecoverError::NoDevice)
}

fn push_unique(addrs: &mut Vec<String>, addr: &str) {
    let addr = addr.to_lowercase();
    if !addrs.contains(&addr) {
        addrs.push(addr);
    }
}

/// Addresses on the `semihosting args` line of the ARM-DS script
pub fn ds_script_addresses(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|l| l.contains("semihosting args"))
        .flat_map(str::split_whitespace)
        .filter(|f| f.starts_with("0x"))
        .map(str::to_lowercase)
        .collect()
}

/// Every address that may hold a boot signature
///
/// Built-in defaults, then those of the toolkit's ARM-DS script, then the
/// labelled addresses of every package map under `search_root`.
pub fn candidate_addresses(toolkit: &Path, search_root: &Path) -> Vec<String> {
    let mut addrs = Vec::new();
    for addr in defaults::RECOVER_DEFAULT_ADDRESSES {
        push_unique(&mut addrs, addr);
    }

    if let Ok(content) = fs::read_to_string(toolkit.join(defaults::DS_SCRIPT)) {
        for addr in ds_script_addresses(&content) {
            push_unique(&mut addrs, &addr);
        }
    }

    let maps = WalkDir::new(search_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name() == defaults::PACKAGE_MAP_FILE);
    for entry in maps {
        match PackageMap::from_path(entry.path()) {
            Ok(map) => {
                for addr in map.labelled_addresses() {
                    push_unique(&mut addrs, &addr);
                }
            }
            Err(e) => tracing::debug!("Skipping {}: {e}", entry.path().display()),
        }
    }
    addrs
}

/// J-Link commands zeroing the first words at each address
pub fn recover_script(addresses: &[String]) -> String {
    let mut lines = vec![
        "si 1".to_string(),
        "speed 2000".to_string(),
        "connect".to_string(),
        "halt".to_string(),
    ];
    for addr in addresses {
        let Ok(base) = u64::from_str_radix(addr.trim_start_matches("0x"), 16) else {
            tracing::warn!("Skipping unparsable address {addr}");
            continue;
        };
        let words: Option<Vec<u64>> = (0..defaults::RECOVER_WORDS as u64)
            .map(|word| base.checked_add(word * 4))
            .collect();
        let Some(words) = words else {
            tracing::warn!("Skipping address {addr}: range runs past the end of memory");
            continue;
        };
        for w in words {
            lines.push(format!("w4 0x{w:x} 0x00000000"));
        }
    }
    lines.push("reset".to_string());
    lines.push("q".to_string());
    lines.join("\n") + "\n"
}

/// One recovery run
#[derive(Debug, Clone)]
pub struct Recovery {
    /// J-Link device name
    pub device: String,
    /// Addresses to clear
    pub addresses: Vec<String>,
    /// Where the command script is written
    pub script: PathBuf,
    /// Optional J-Link reset script
    pub reset_script: Option<PathBuf>,
    /// Time budget for J-Link
    pub timeout: Duration,
}

impl Recovery {
    /// Plan a recovery run from `work_dir`
    pub fn plan(device: String, toolkit: &Path, work_dir: &Path, timeout: Duration) -> Self {
        let reset = work_dir.join(defaults::JLINK_RESET_SCRIPT);
        Self {
            device,
            addresses: candidate_addresses(toolkit, work_dir),
            script: std::env::temp_dir().join(defaults::JLINK_RECOVER_SCRIPT),
            reset_script: reset.is_file().then_some(reset),
            timeout,
        }
    }

    /// J-Link invocation
    pub fn command(&self) -> ToolCommand {
        let mut cmd = ToolCommand::new(jlink_program(), self.timeout);
        if let Some(reset) = &self.reset_script {
            cmd = cmd.arg("-JLinkScriptFile").arg(reset);
        }
        cmd.args(["-Device", self.device.as_str()])
            .args(["-If", "JTAG", "-Speed", "4000", "-AutoConnect", "1"])
            .arg("-CommandFile")
            .arg(&self.script)
    }

    /// Write the script, run J-Link and check it connected
    pub async fn run(&self) -> Result<String, RecoverError> {
        filesystem::write_file(&self.script, &recover_script(&self.addresses)).map_err(|e| {
            RecoverError::Script {
                path: self.script.clone(),
                error: e.to_string(),
            }
        })?;

        let result = self.command().run().await;
        if let Err(e) = fs::remove_file(&self.script) {
            tracing::debug!("Could not remove {}: {e}", self.script.display());
        }

        let out = result?;
        if !out.output.contains(CONNECTED_MARKER) {
            return Err(RecoverError::NotConnected { output: out.output });
        }
        tracing::info!("Cleared {} address(es) on {}", self.addresses.len(), self.device);
        Ok(out.output)
    }
}
