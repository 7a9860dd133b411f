//! Artifact staging and TOC signing
//!
//! `app-gen-toc` only works from the toolkit root and reads its input binary
//! from the toolkit-relative path named in the signing configuration. A sign
//! run therefore:
//!
//! 1. resolves the signing configuration,
//! 2. points the toolkit at the target device (non-fatal),
//! 3. reads the configuration's `binary` field,
//! 4. stages the binary at every location the tool may read it from,
//! 5. stages the configuration under a fixed name in the toolkit root,
//! 6. runs `app-gen-toc -f <staged> -o build/AppTocPackage.bin`,
//! 7. moves every produced artifact back into the caller's build directory.
//!
//! Staged files never outlive the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::device_sync::{self, SyncOutcome};
use super::selector::Selector;
use super::target_config::{self, ConfigQuery, TargetConfig};
use super::tool_config::ToolConfig;
use crate::config::defaults;
use crate::error::{FilesystemError, SignError};
use crate::infra::filesystem;
use crate::infra::process::ToolCommand;

/// What to sign and where results go
#[derive(Debug, Clone)]
pub struct SignRequest<'a> {
    /// Root searched for signing configurations
    pub project_dir: &'a Path,
    /// Directory receiving the signed artifacts
    pub build_dir: &'a Path,
    /// Binary to sign
    pub binary: &'a Path,
    /// Core hint for configuration narrowing
    pub core_hint: Option<&'a str>,
    /// Project hint for configuration narrowing
    pub project_hint: Option<&'a str>,
    /// Explicit configuration file
    pub config_override: Option<&'a Path>,
    /// Part-qualified target used for the toolkit device sync; the
    /// configuration's CPU id is used when absent
    pub target_core: Option<&'a str>,
}

/// Result of a sign run
#[derive(Debug, Clone)]
pub struct SignOutcome {
    /// Retrieved TOC package
    pub toc: PathBuf,
    /// Retrieved signed image, if the tool produced one
    pub signed_image: Option<PathBuf>,
    /// Retrieved package map, if the tool produced one
    pub map_file: Option<PathBuf>,
    /// Signing configuration used
    pub config_path: PathBuf,
    /// Parsed signing configuration
    pub config: TargetConfig,
    /// File name the binary was staged under
    pub staged_name: String,
    /// Device sync result; `None` when it was skipped or failed
    pub device_sync: Option<SyncOutcome>,
    /// Non-fatal problems met along the way
    pub warnings: Vec<String>,
}

/// Toolkit-relative locations the tool may read the input binary from
///
/// The configured path first, then the same file name under `build/images`.
pub fn staging_targets(toolkit: &Path, binary_field: &str) -> Vec<PathBuf> {
    let primary = toolkit.join(binary_field);
    let mut targets = vec![primary.clone()];
    if let Some(name) = primary.file_name() {
        let secondary = toolkit.join(defaults::TOOLKIT_IMAGES_DIR).join(name);
        if secondary != primary {
            targets.push(secondary);
        }
    }
    targets
}

fn with_extension_suffix(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Configuration copied into the toolkit root for the duration of a run
struct StagedConfig {
    path: PathBuf,
}

impl StagedConfig {
    fn stage(source: &Path, toolkit: &Path) -> Result<Self, SignError> {
        let path = toolkit.join(defaults::STAGED_CONFIG_FILE);
        filesystem::copy_file(source, &path).map_err(|e| stage_error(&path, &e))?;
        Ok(Self { path })
    }
}

impl Drop for StagedConfig {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::debug!("Could not remove {}: {e}", self.path.display());
        }
    }
}

/// Copies of the input binary placed in the toolkit
///
/// Dropping the guard removes every copy and any sidecar the tool wrote next
/// to it. The caller's own input is left alone, even when it is one of the
/// targets.
struct StagedBinaries {
    targets: Vec<PathBuf>,
    input: PathBuf,
}

impl StagedBinaries {
    fn stage(input: &Path, targets: Vec<PathBuf>) -> Result<Self, SignError> {
        let mut staged = Self {
            targets: Vec::with_capacity(targets.len()),
            input: input.to_path_buf(),
        };
        for target in targets {
            tracing::debug!("Staging {} at {}", input.display(), target.display());
            filesystem::copy_file(input, &target).map_err(|e| stage_error(&target, &e))?;
            staged.targets.push(target);
        }
        Ok(staged)
    }

    fn leftovers(&self) -> Vec<PathBuf> {
        let sidecars = self.targets.iter().flat_map(|t| {
            defaults::SIDECAR_EXTENSIONS
                .iter()
                .map(move |ext| with_extension_suffix(t, ext))
        });
        self.targets
            .iter()
            .cloned()
            .chain(sidecars)
            .filter(|t| *t != self.input)
            .collect()
    }
}

impl Drop for StagedBinaries {
    fn drop(&mut self) {
        for path in self.leftovers().iter().filter(|p| p.exists()) {
            if let Err(e) = fs::remove_file(path) {
                tracing::debug!("Could not remove staged {}: {e}", path.display());
            }
        }
    }
}

fn stage_error(path: &Path, e: &FilesystemError) -> SignError {
    SignError::Stage {
        path: path.to_path_buf(),
        error: e.to_string(),
    }
}

/// Runs the staging and signing protocol against one toolkit installation
pub struct Signer<'a> {
    toolkit: PathBuf,
    timeout: Duration,
    selector: &'a dyn Selector,
}

impl<'a> Signer<'a> {
    /// Create a signer for the configured toolkit
    pub fn new(config: &ToolConfig, selector: &'a dyn Selector) -> Result<Self, SignError> {
        let toolkit = config
            .toolkit()
            .map_err(|_| SignError::ToolkitNotConfigured)?
            .to_path_buf();
        Ok(Self {
            toolkit,
            timeout: config.sign_timeout(),
            selector,
        })
    }

    /// Toolkit root
    pub fn toolkit(&self) -> &Path {
        &self.toolkit
    }

    /// Sign `request.binary`, leaving the artifacts in `request.build_dir`
    pub async fn sign_artifact(&self, request: &SignRequest<'_>) -> Result<SignOutcome, SignError> {
        if !request.binary.is_file() {
            return Err(SignError::BinaryNotFound {
                path: request.binary.to_path_buf(),
            });
        }

        let (config, config_path) = target_config::resolve(
            &ConfigQuery {
                explicit: request.config_override,
                search_root: Some(request.project_dir),
                core_hint: request.core_hint,
                project_hint: request.project_hint,
            },
            self.selector,
        )?;

        let mut warnings = Vec::new();
        let device_sync = self.sync_device(request, &config, &mut warnings);

        let binary_field = config.binary_field(&config_path)?.to_string();
        let targets = staging_targets(&self.toolkit, &binary_field);
        self.clear_previous_outputs(&targets);

        let staged = StagedBinaries::stage(request.binary, targets)?;

        self.run_gen_toc(&config_path).await?;
        let (toc, signed_image, map_file) =
            self.retrieve(request.build_dir, &staged.targets, request.binary)?;
        let staged_name = staged
            .targets
            .first()
            .and_then(|t| t.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        drop(staged);

        Ok(SignOutcome {
            toc,
            signed_image,
            map_file,
            config_path,
            config,
            staged_name,
            device_sync,
            warnings,
        })
    }

    fn sync_device(
        &self,
        request: &SignRequest<'_>,
        config: &TargetConfig,
        warnings: &mut Vec<String>,
    ) -> Option<SyncOutcome> {
        let Some(target) = request
            .target_core
            .filter(|t| !t.is_empty())
            .or_else(|| config.cpu())
        else {
            tracing::debug!("No target identity known; toolkit device sync skipped");
            return None;
        };

        match device_sync::sync_toolkit_device(&self.toolkit, target) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                let msg = format!("Toolkit device sync failed: {e}");
                tracing::warn!("{msg}");
                warnings.push(msg);
                None
            }
        }
    }

    fn toc_source(&self) -> PathBuf {
        self.toolkit
            .join(defaults::TOOLKIT_BUILD_DIR)
            .join(defaults::TOC_FILE)
    }

    fn map_source(&self) -> PathBuf {
        self.toolkit
            .join(defaults::TOOLKIT_BUILD_DIR)
            .join(defaults::PACKAGE_MAP_FILE)
    }

    /// Outputs left over from an earlier, interrupted run
    fn clear_previous_outputs(&self, targets: &[PathBuf]) {
        let toc = self.toc_source();
        let mut stale = vec![toc.clone(), self.map_source()];
        for target in std::iter::once(&toc).chain(targets) {
            for ext in defaults::SIDECAR_EXTENSIONS {
                stale.push(with_extension_suffix(target, ext));
            }
        }
        for path in stale.iter().filter(|p| p.exists()) {
            tracing::debug!("Removing stale {}", path.display());
            if let Err(e) = fs::remove_file(path) {
                tracing::debug!("Could not remove stale {}: {e}", path.display());
            }
        }
    }

    async fn run_gen_toc(&self, config_path: &Path) -> Result<(), SignError> {
        let staged = StagedConfig::stage(config_path, &self.toolkit)?;
        let output = format!("{}/{}", defaults::TOOLKIT_BUILD_DIR, defaults::TOC_FILE);

        ToolCommand::new(self.toolkit.join(defaults::GEN_TOC_TOOL), self.timeout)
            .arg("-f")
            .arg(defaults::STAGED_CONFIG_FILE)
            .arg("-o")
            .arg(output)
            .current_dir(&self.toolkit)
            .run()
            .await?;

        drop(staged);
        Ok(())
    }

    /// Move generated artifacts into `build_dir`
    ///
    /// Only the TOC package is required.
    fn retrieve(
        &self,
        build_dir: &Path,
        targets: &[PathBuf],
        input: &Path,
    ) -> Result<(PathBuf, Option<PathBuf>, Option<PathBuf>), SignError> {
        let toc_src = self.toc_source();
        if !toc_src.is_file() {
            return Err(SignError::TocMissing { path: toc_src });
        }

        let mut moves: Vec<(PathBuf, PathBuf)> = Vec::new();
        let toc_dst = build_dir.join(defaults::TOC_FILE);
        moves.push((toc_src.clone(), toc_dst.clone()));
        for ext in defaults::SIDECAR_EXTENSIONS {
            moves.push((
                with_extension_suffix(&toc_src, ext),
                with_extension_suffix(&toc_dst, ext),
            ));
        }

        let image_dst = build_dir.join(defaults::SIGNED_IMAGE_FILE);
        for ext in defaults::SIDECAR_EXTENSIONS {
            if let Some(src) = targets
                .iter()
                .map(|t| with_extension_suffix(t, ext))
                .find(|p| p.is_file())
            {
                moves.push((src, with_extension_suffix(&image_dst, ext)));
            }
        }
        if targets[0] == input {
            filesystem::copy_file(input, &image_dst).map_err(|e| stage_error(input, &e))?;
        } else {
            moves.push((targets[0].clone(), image_dst.clone()));
        }

        let map_dst = build_dir.join(defaults::PACKAGE_MAP_FILE);
        moves.push((self.map_source(), map_dst.clone()));

        for (src, dst) in moves.iter().filter(|(src, _)| src.is_file()) {
            tracing::debug!("Retrieving {} -> {}", src.display(), dst.display());
            filesystem::move_file(src, dst).map_err(|e| stage_error(src, &e))?;
        }

        Ok((
            toc_dst,
            image_dst.is_file().then_some(image_dst),
            map_dst.is_file().then_some(map_dst),
        ))
    }
}
