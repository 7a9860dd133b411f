//! CLI command implementation for `alif build`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use super::{context_identity, sign_with_progress, solution_root, Session, SignJob};
use crate::core::build_env::Toolchain;
use crate::core::build_state::BuildState;
use crate::core::builder::{builds_all_contexts, BuildPlan, Builder};
use crate::core::context::{resolve_from_list, ContextFilter, ContextResolver};
use crate::core::solution;
use crate::error::AlifError;
use crate::infra::filesystem;

/// Arguments of `alif build`
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Solution directory or `.csolution.yml` file
    pub solution: Option<PathBuf>,

    /// Project filter (context prefix)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Target type (e.g. E7-HE)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Clean and rebuild; rebuilds every context when no filter is given
    #[arg(long)]
    pub clean: bool,

    /// Sign the built binary and record it for `alif flash`
    #[arg(long)]
    pub sign: bool,

    /// Signing configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Execute the build command
pub async fn execute(session: &Session, current_dir: &Path, args: BuildArgs) -> Result<()> {
    let ui = &session.ui;
    let config = session.load_config()?;
    let root = solution_root(args.solution.as_deref(), current_dir)?;
    let solution_file = solution::find_csolution(&root).map_err(AlifError::from)?;
    let toolchain = Toolchain::from_config(&config);

    let filter = ContextFilter {
        target: args.target.clone(),
        project: args.project.clone(),
    };

    let plan = if builds_all_contexts(args.clean, &filter) {
        ui.header("Clean & Rebuild Solution");
        ui.item("Scope", "All contexts");
        BuildPlan::all_contexts(&solution_file)
    } else {
        ui.header("Resolve Build Context");
        if let Some(project) = &filter.project {
            ui.item("Filter", project);
        }
        if let Some(target) = &filter.target {
            ui.item("Target", target);
        }
        let spinner = ui.spinner("Listing contexts...");
        let contexts = ContextResolver::new(&toolchain).list(&solution_file).await;
        drop(spinner);
        let contexts = contexts.map_err(AlifError::from)?;
        let context =
            resolve_from_list(&contexts, &filter, session.selector()).map_err(AlifError::from)?;
        ui.item("Selected", &context);
        BuildPlan::for_context(&solution_file, context, args.clean)
    };

    ui.header("Compile Source Code");
    let message = plan
        .context
        .as_ref()
        .map_or_else(|| "Building all contexts...".to_string(), |c| format!("Building {c}..."));
    let spinner = ui.spinner(&message);
    let output = match Builder::new(&toolchain).build(&plan, &root).await {
        Ok(output) => output,
        Err(e) => {
            spinner.fail("Build failed");
            return Err(AlifError::from(e).into());
        }
    };
    spinner.succeed(&format!(
        "Build completed in {:.1}s",
        output.duration.as_secs_f64()
    ));
    if session.verbose > 1 {
        ui.block(&output.log);
    }

    let Some(context) = plan.context else {
        if args.sign {
            ui.warn("--sign needs a single context; nothing was signed");
        }
        return Ok(());
    };

    let artifact = solution::locate_artifact(&root, &context).map_err(AlifError::from)?;
    ui.item("Artifact", artifact.display());

    if !args.sign {
        return Ok(());
    }

    ui.header("Sign Image");
    let identity = context_identity(&root, &context);
    let build_dir = artifact
        .parent()
        .map_or_else(|| root.clone(), Path::to_path_buf);
    let outcome = sign_with_progress(
        session,
        &config,
        &SignJob {
            project_dir: &root,
            build_dir: &build_dir,
            binary: &artifact,
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
    BuildState::new(&artifact, &outcome.toc, target_core.as_deref())
        .save(&root)
        .map_err(AlifError::from)
        .context("Failed to record build state")?;

    ui.header("Summary");
    ui.item("Context", &context);
    ui.item("Binary", artifact.display());
    ui.item("TOC", outcome.toc.display());
    match filesystem::file_sha256(&outcome.toc) {
        Ok(digest) => ui.item("SHA-256", digest),
        Err(e) => tracing::debug!("Could not hash TOC: {e}"),
    }
    ui.item("Duration", format!("{:.1}s", output.duration.as_secs_f64()));
    ui.success("Ready to flash: run 'alif flash'");
    Ok(())
}
