//! CLI command implementation for `alif setup`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::Session;
use crate::config::defaults;
use crate::core::tool_config::ToolConfig;

/// Arguments of `alif setup`
#[derive(Args, Debug, Default, Clone)]
pub struct SetupArgs {
    /// Alif Security Toolkit root
    #[arg(long)]
    pub toolkit: Option<PathBuf>,

    /// CMSIS-Toolbox `bin` directory
    #[arg(long)]
    pub cmsis_toolbox: Option<PathBuf>,

    /// GCC toolchain `bin` directory
    #[arg(long)]
    pub gcc: Option<PathBuf>,

    /// CMSIS pack root
    #[arg(long)]
    pub pack_root: Option<PathBuf>,

    /// Signing key and certificate directory
    #[arg(long)]
    pub signing_key: Option<PathBuf>,
}

/// Merge the flags into `config`
///
/// `detected_toolbox` fills the CMSIS-Toolbox path when neither the flags
/// nor the existing configuration name one. The signing key directory
/// defaults to `<toolkit>/cert`.
pub fn apply(mut config: ToolConfig, args: SetupArgs, detected_toolbox: Option<PathBuf>) -> ToolConfig {
    if let Some(toolkit) = args.toolkit {
        config.alif_tools_path = Some(toolkit);
    }
    if let Some(toolbox) = args.cmsis_toolbox {
        config.cmsis_toolbox_path = Some(toolbox);
    } else if config.cmsis_toolbox_path.is_none() {
        config.cmsis_toolbox_path = detected_toolbox;
    }
    if let Some(gcc) = args.gcc {
        config.gcc_toolchain_path = Some(gcc);
    }
    if let Some(packs) = args.pack_root {
        config.cmsis_pack_root = Some(packs);
    }
    if let Some(key) = args.signing_key {
        config.signing_key_path = Some(key);
    } else if config.signing_key_path.is_none() {
        config.signing_key_path = config.alif_tools_path.as_ref().map(|t| t.join("cert"));
    }
    config
}

fn detect_toolbox() -> Option<PathBuf> {
    let cbuild = which::which("cbuild").ok()?;
    tracing::info!("Found cbuild at {}", cbuild.display());
    cbuild.parent().map(PathBuf::from)
}

fn show(path: Option<&PathBuf>) -> String {
    path.map_or_else(|| "(not set)".to_string(), |p| p.display().to_string())
}

/// Execute the setup command
pub fn execute(session: &Session, args: SetupArgs) -> Result<()> {
    let ui = &session.ui;
    let current = session.load_config()?;
    let config = apply(current, args, detect_toolbox());

    if let Ok(toolkit) = config.toolkit() {
        if !toolkit.join(defaults::GEN_TOC_TOOL).exists() {
            ui.warn(&format!(
                "{} not found in {}; check the toolkit path",
                defaults::GEN_TOC_TOOL,
                toolkit.display()
            ));
        }
    }

    config
        .save(&session.dirs)
        .context("Failed to save alif configuration")?;

    ui.header("Alif Configuration");
    ui.item("Toolkit", show(config.alif_tools_path.as_ref()));
    ui.item("CMSIS", show(config.cmsis_toolbox_path.as_ref()));
    ui.item("GCC", show(config.gcc_toolchain_path.as_ref()));
    ui.item("Packs", show(config.cmsis_pack_root.as_ref()));
    ui.item("Keys", show(config.signing_key_path.as_ref()));
    ui.success(&format!(
        "Saved to {}",
        session.dirs.tool_config_path().display()
    ));
    Ok(())
}
