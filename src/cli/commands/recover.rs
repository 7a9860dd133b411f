//! CLI command implementation for `alif recover`

use std::path::Path;

use anyhow::{bail, Result};

use super::{solution_root, Session};
use crate::cli::output::confirm;
use crate::core::recover::{resolve_device, Recovery};
use crate::error::AlifError;

/// Execute the recover command
pub async fn execute(
    session: &Session,
    current_dir: &Path,
    device: Option<&str>,
    yes: bool,
) -> Result<()> {
    let ui = &session.ui;
    let config = session.load_config()?;
    let toolkit = config.toolkit().map_err(AlifError::from)?.to_path_buf();

    ui.header("Hardware Recovery");
    let root = solution_root(None, current_dir).unwrap_or_else(|_| current_dir.to_path_buf());
    let device = resolve_device(device, &root).map_err(AlifError::from)?;
    ui.item("Device", &device);

    let recovery = Recovery::plan(device, &toolkit, current_dir, config.flash_timeout());
    for addr in &recovery.addresses {
        ui.item("Targeting", addr);
    }
    if let Some(reset) = &recovery.reset_script {
        ui.item("Script", reset.display());
    }

    if !yes {
        if session.non_interactive {
            bail!("Recovery erases boot signatures; pass --yes to run it non-interactively");
        }
        if !confirm("Clear boot signatures on the connected device?")? {
            ui.info("Recovery cancelled");
            return Ok(());
        }
    }

    let spinner = ui.spinner(&format!("Recovering {} via J-Link...", recovery.device));
    match recovery.run().await {
        Ok(_) => spinner.succeed("Boot signatures cleared"),
        Err(e) => {
            spinner.fail("Recovery failed");
            ui.info("If JTAG fails, hold the ISP button while pressing reset to enter ISP mode manually");
            return Err(AlifError::from(e).into());
        }
    }
    ui.info("Power cycle the board to enter ISP mode");
    Ok(())
}
