//! CLI command implementation for `alif flash`
//!
//! Three ways to pick what gets programmed:
//! - a binary path: sign it in its own directory, then flash,
//! - `-p <project>`: resolve a context of the solution, re-sign its binary,
//!   then flash,
//! - nothing: flash what the last `alif build --sign` recorded.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;

use super::{context_identity, sign_with_progress, solution_root, Session, SignJob};
use crate::cli::output::Ui;
use crate::core::build_env::Toolchain;
use crate::core::build_state::BuildState;
use crate::core::context::{resolve_from_list, ContextFilter, ContextResolver};
use crate::core::flash::{
    select_port, FlashMethod, FlashOptions, FlashReport, FlashTarget, Flasher, StageStatus,
    ToolkitProbe,
};
use crate::core::solution;
use crate::core::tool_config::ToolConfig;
use crate::error::AlifError;
use crate::infra::serial::SystemPorts;

/// Arguments of `alif flash`
#[derive(Args, Debug)]
pub struct FlashArgs {
    /// Binary to sign and flash
    pub binary: Option<PathBuf>,

    /// Project filter; resolves a solution context and re-signs it
    #[arg(short, long)]
    pub project: Option<String>,

    /// Target type filter used with --project
    #[arg(short, long)]
    pub target: Option<String>,

    /// Signing configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Programming method (ISP or JTAG)
    #[arg(short, long, default_value = "ISP")]
    pub method: FlashMethod,

    /// Erase the application region before programming
    #[arg(long)]
    pub erase: bool,

    /// Disable baud-rate switching
    #[arg(long)]
    pub slow: bool,

    /// Skip checking the connected device
    #[arg(long, visible_alias = "nv")]
    pub no_verify: bool,

    /// Serial port to use instead of detecting one
    #[arg(long)]
    pub port: Option<String>,
}

/// Execute the flash command
pub async fn execute(session: &Session, current_dir: &Path, args: FlashArgs) -> Result<()> {
    let ui = &session.ui;
    let config = session.load_config()?;
    let toolkit = config.toolkit().map_err(AlifError::from)?.to_path_buf();

    let target = if let Some(binary) = &args.binary {
        binary_mode(session, &config, &current_dir.join(binary), &args).await?
    } else if args.project.is_some() {
        project_mode(session, &config, current_dir, &args).await?
    } else {
        state_mode(ui, current_dir)?
    };

    ui.header("Flash Target");
    ui.item("Method", args.method);
    ui.item("Image", target.signed_image.display());
    ui.item("TOC", target.toc.display());

    let port = if args.method == FlashMethod::Isp {
        let port = select_port(&SystemPorts, session.selector(), args.port.as_deref())
            .map_err(AlifError::from)?;
        ui.item("Port", &port);
        Some(port)
    } else {
        None
    };

    let options = FlashOptions {
        method: args.method,
        erase: args.erase,
        verify: !args.no_verify,
        slow: args.slow,
        verbose: session.verbose > 0,
        port,
    };

    let probe = ToolkitProbe::new(&toolkit, config.flash_timeout());
    let flasher =
        Flasher::new(&config, &SystemPorts, session.selector(), probe).map_err(AlifError::from)?;

    let spinner = ui.spinner(&format!("Flashing via {}...", args.method));
    let report = match flasher.flash(&target, &options).await {
        Ok(report) => report,
        Err(e) => {
            spinner.fail("Flash failed");
            return Err(AlifError::from(e).into());
        }
    };
    spinner.succeed("Flash complete");
    print_report(ui, &report);
    ui.info("Reset the board to run the new image");
    Ok(())
}

async fn binary_mode(
    session: &Session,
    config: &ToolConfig,
    binary: &Path,
    args: &FlashArgs,
) -> Result<FlashTarget> {
    if binary.is_dir() {
        bail!(
            "'{}' is a directory. Use -p to select a project, or pass a binary file",
            binary.display()
        );
    }
    let binary = binary.to_path_buf();
    let work_dir = binary
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    session.ui.header("Binary Mode Setup");
    session.ui.item("Binary", binary.display());
    let outcome = sign_with_progress(
        session,
        config,
        &SignJob {
            project_dir: &work_dir,
            build_dir: &work_dir,
            binary: &binary,
            core_hint: None,
            project_hint: None,
            config: args.config.as_deref(),
            target_core: None,
        },
    )
    .await?;

    let mut target = FlashTarget::from_toc(&outcome.toc, outcome.config.cpu())
        .with_image_name(&outcome.staged_name);
    if let Some(name) = binary.file_name().and_then(|n| n.to_str()) {
        target = target.with_image_name(name);
    }
    Ok(target)
}

async fn project_mode(
    session: &Session,
    config: &ToolConfig,
    current_dir: &Path,
    args: &FlashArgs,
) -> Result<FlashTarget> {
    let ui = &session.ui;
    let root = solution_root(None, current_dir)?;
    let solution_file = solution::find_csolution(&root).map_err(AlifError::from)?;
    let toolchain = Toolchain::from_config(config);

    ui.header("Resolve Build Context");
    let filter = ContextFilter {
        target: args.target.clone(),
        project: args.project.clone(),
    };
    let contexts = ContextResolver::new(&toolchain)
        .list(&solution_file)
        .await
        .map_err(AlifError::from)?;
    let context =
        resolve_from_list(&contexts, &filter, session.selector()).map_err(AlifError::from)?;
    ui.item("Selected", &context);

    let binary = solution::locate_artifact(&root, &context).map_err(AlifError::from)?;
    let build_dir = binary
        .parent()
        .map_or_else(|| root.clone(), Path::to_path_buf);
    let identity = context_identity(&root, &context);

    ui.header("Create Image");
    let outcome = sign_with_progress(
        session,
        config,
        &SignJob {
            project_dir: &root,
            build_dir: &build_dir,
            binary: &binary,
            core_hint: Some(&identity.core_hint),
            project_hint: Some(&context.project),
            config: args.config.as_deref(),
            target_core: identity.target_core.as_deref(),
        },
    )
    .await?;

    let target_core = identity
        .target_core
        .or_else(|| outcome.config.cpu().map(str::to_string));
    BuildState::new(&binary, &outcome.toc, target_core.as_deref())
        .save(&root)
        .map_err(AlifError::from)?;

    let mut target =
        FlashTarget::from_toc(&outcome.toc, target_core.as_deref()).with_image_name(&outcome.staged_name);
    if let Some(name) = binary.file_name().and_then(|n| n.to_str()) {
        target = target.with_image_name(name);
    }
    Ok(target)
}

fn state_mode(ui: &Ui, current_dir: &Path) -> Result<FlashTarget> {
    let root = solution_root(None, current_dir).unwrap_or_else(|_| current_dir.to_path_buf());
    let state = BuildState::load_verified(&root).map_err(AlifError::from)?;

    ui.header("Last Build");
    ui.item("Binary", state.binary.display());
    if let Some(core) = &state.target_core {
        ui.item("Target", core);
    }

    let mut target = FlashTarget::from_toc(&state.toc, state.target_core.as_deref());
    if let Some(name) = state.binary.file_name().and_then(|n| n.to_str()) {
        target = target.with_image_name(name);
    }
    Ok(target)
}

fn print_report(ui: &Ui, report: &FlashReport) {
    ui.item("Image addr", &report.addresses.image);
    ui.item("TOC addr", &report.addresses.toc);
    if let Some(device) = &report.device {
        ui.item(
            "Device",
            format!(
                "{} rev {}",
                device.part,
                device.revision.as_deref().unwrap_or("-")
            ),
        );
    }
    for stage in &report.stages {
        match &stage.status {
            StageStatus::Passed => ui.success(stage.stage),
            StageStatus::Skipped(reason) => ui.item(stage.stage, format!("skipped ({reason})")),
            StageStatus::Warned(reason) => ui.warn(&format!("{}: {reason}", stage.stage)),
        }
    }
    if let Some(output) = &report.tool_output {
        ui.block(output);
    }
}
