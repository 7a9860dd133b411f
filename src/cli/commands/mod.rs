//! CLI command implementations
//!
//! Each command is implemented in its own submodule. Helpers shared by
//! several commands (solution lookup, signing with progress) live here.

pub mod build;
pub mod flash;
pub mod image;
pub mod recover;
pub mod setup;
pub mod version;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::Ui;
use crate::core::context::BuildContext;
use crate::core::selector::{selector_for, Selector};
use crate::core::signer::{SignOutcome, SignRequest, Signer};
use crate::core::solution::{self, CbuildDescriptor};
use crate::core::target_config::{self, ConfigQuery};
use crate::core::tool_config::ToolConfig;
use crate::error::AlifError;
use crate::infra::dirs::AlifDirs;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a solution context with cbuild
    Build(build::BuildArgs),

    /// Program a signed image into MRAM over ISP or J-Link
    Flash(flash::FlashArgs),

    /// Sign a standalone binary in place
    #[command(alias = "sign")]
    Image {
        /// Binary to sign
        binary: PathBuf,

        /// Signing configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Configure toolkit and toolchain paths
    Setup(setup::SetupArgs),

    /// Clear boot signatures via J-Link so the device falls back to ISP
    Recover {
        /// J-Link device name (e.g. AE722F80F55D5LS_M55_HE)
        #[arg(short, long)]
        device: Option<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

impl Commands {
    /// Execute the command
    pub async fn run(self, session: &Session) -> Result<()> {
        match self {
            Self::Build(args) => {
                let current_dir = env::current_dir()?;
                build::execute(session, &current_dir, args).await
            }
            Self::Flash(args) => {
                let current_dir = env::current_dir()?;
                flash::execute(session, &current_dir, args).await
            }
            Self::Image { binary, config } => {
                image::execute(session, &binary, config.as_deref()).await
            }
            Self::Setup(args) => setup::execute(session, args),
            Self::Recover { device, yes } => {
                let current_dir = env::current_dir()?;
                recover::execute(session, &current_dir, device.as_deref(), yes).await
            }
            Self::Version => {
                version::execute();
                Ok(())
            }
        }
    }
}

/// Per-invocation state shared by every command
pub struct Session {
    /// Output
    pub ui: Ui,
    /// Never prompt
    pub non_interactive: bool,
    /// `-v` count
    pub verbose: u8,
    /// Config directory
    pub dirs: AlifDirs,
    selector: Box<dyn Selector>,
}

impl Session {
    /// Session for the given global flags
    pub fn new(quiet: bool, non_interactive: bool, verbose: u8) -> Self {
        Self {
            ui: Ui::new(quiet),
            non_interactive,
            verbose,
            dirs: AlifDirs::new(),
            selector: selector_for(non_interactive),
        }
    }

    /// Disambiguation for this invocation
    pub fn selector(&self) -> &dyn Selector {
        self.selector.as_ref()
    }

    /// Load the tool configuration
    pub fn load_config(&self) -> Result<ToolConfig> {
        ToolConfig::load(&self.dirs)
            .map_err(AlifError::from)
            .context("Failed to load alif configuration")
    }
}

/// Solution root for an optional path argument
///
/// Accepts a directory or the `.csolution.yml` file itself; defaults to the
/// current directory.
pub fn solution_root(arg: Option<&Path>, current_dir: &Path) -> Result<PathBuf> {
    let dir = match arg {
        Some(p) if p.is_file() => p.parent().map_or_else(|| current_dir.to_path_buf(), Path::to_path_buf),
        Some(p) => p.to_path_buf(),
        None => current_dir.to_path_buf(),
    };
    Ok(solution::is_solution_root(&dir).map_err(AlifError::from)?)
}

/// Signing identity of a built context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextIdentity {
    /// Hint narrowing signing configurations
    pub core_hint: String,
    /// Part-qualified target, when the build descriptor names one
    pub target_core: Option<String>,
}

/// Identity from the context's build descriptor, else from its target name
pub fn context_identity(root: &Path, context: &BuildContext) -> ContextIdentity {
    match solution::find_descriptor(root, context).and_then(|p| CbuildDescriptor::load(&p)) {
        Ok(descriptor) => {
            let id = descriptor.device_id();
            ContextIdentity {
                core_hint: id.core_hint,
                target_core: Some(id.target_core).filter(|t| !t.is_empty()),
            }
        }
        Err(e) => {
            tracing::debug!("Using context target as signing hint: {e}");
            ContextIdentity {
                core_hint: context.target.clone(),
                target_core: None,
            }
        }
    }
}

/// Inputs for [`sign_with_progress`]
pub struct SignJob<'a> {
    /// Root searched for signing configurations
    pub project_dir: &'a Path,
    /// Directory receiving the artifacts
    pub build_dir: &'a Path,
    /// Binary to sign
    pub binary: &'a Path,
    /// Configuration narrowing hints
    pub core_hint: Option<&'a str>,
    /// Project hint
    pub project_hint: Option<&'a str>,
    /// Explicit configuration
    pub config: Option<&'a Path>,
    /// Part-qualified target
    pub target_core: Option<&'a str>,
}

/// Resolve the signing configuration, then sign under a spinner
///
/// Resolution happens first so any selection prompt is never drawn over by
/// the spinner.
pub async fn sign_with_progress(
    session: &Session,
    config: &ToolConfig,
    job: &SignJob<'_>,
) -> Result<SignOutcome> {
    let ui = &session.ui;
    let signer = Signer::new(config, session.selector()).map_err(AlifError::from)?;

    let (_, config_path) = target_config::resolve(
        &ConfigQuery {
            explicit: job.config,
            search_root: Some(job.project_dir),
            core_hint: job.core_hint,
            project_hint: job.project_hint,
        },
        session.selector(),
    )
    .map_err(AlifError::from)?;
    ui.item("Config", config_path.display());

    let request = SignRequest {
        project_dir: job.project_dir,
        build_dir: job.build_dir,
        binary: job.binary,
        core_hint: job.core_hint,
        project_hint: job.project_hint,
        config_override: Some(&config_path),
        target_core: job.target_core,
    };

    let spinner = ui.spinner("Signing...");
    let outcome = match signer.sign_artifact(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.fail("Signing failed");
            return Err(AlifError::from(e).into());
        }
    };
    spinner.succeed("Image signed");

    for warning in &outcome.warnings {
        ui.warn(warning);
    }
    ui.item("TOC", outcome.toc.display());
    if let Some(image) = &outcome.signed_image {
        ui.item("Image", image.display());
    }
    Ok(outcome)
}
