//! Solution and build-output discovery
//!
//! A solution root is a directory holding a `*.csolution.yml`. After a build,
//! CMSIS-Toolbox writes one `<context>.cbuild.yml` per context describing the
//! device and where the binary went; this module reads those descriptors so
//! the binary can be located without re-running the build tool.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use super::context::BuildContext;
use crate::config::defaults;
use crate::error::SolutionError;

/// Check that `dir` is a solution root, returning its absolute path
pub fn is_solution_root(dir: &Path) -> Result<PathBuf, SolutionError> {
    let abs = absolute(dir)?;
    find_csolution(&abs)?;
    Ok(abs)
}

/// First `*.csolution.yml` in `dir`, in file-name order
pub fn find_csolution(dir: &Path) -> Result<PathBuf, SolutionError> {
    let entries = fs::read_dir(dir).map_err(|e| SolutionError::Io {
        path: dir.to_path_buf(),
        error: e.to_string(),
    })?;

    let mut solutions: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(defaults::SOLUTION_SUFFIX))
        })
        .collect();
    solutions.sort();

    if solutions.len() > 1 {
        tracing::debug!(
            "Several solution files in {}, using {}",
            dir.display(),
            solutions[0].display()
        );
    }

    solutions
        .into_iter()
        .next()
        .ok_or_else(|| SolutionError::NotFound {
            dir: dir.to_path_buf(),
        })
}

fn absolute(dir: &Path) -> Result<PathBuf, SolutionError> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(dir))
        .map_err(|e| SolutionError::Io {
            path: dir.to_path_buf(),
            error: e.to_string(),
        })
}

/// Conventional binary location for a context
///
/// `out/<project>/<target>/<build-type>/<project>.bin` under the solution root.
pub fn conventional_artifact_path(root: &Path, context: &BuildContext) -> PathBuf {
    root.join("out")
        .join(&context.project)
        .join(&context.target)
        .join(&context.build_type)
        .join(format!("{}.bin", context.project))
}

/// Find `<context>.cbuild.yml` below `root`
///
/// Vendored and generated trees (`.git`, `packs`, `out`, ...) are not searched.
pub fn find_descriptor(root: &Path, context: &BuildContext) -> Result<PathBuf, SolutionError> {
    let file = format!("{context}{}", defaults::CBUILD_SUFFIX);

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !defaults::DESCRIPTOR_SKIP_DIRS
                    .iter()
                    .any(|skip| e.file_name() == *skip)
        })
        .filter_map(Result::ok)
        .find(|e| e.file_type().is_file() && e.file_name().to_str() == Some(file.as_str()))
        .map(walkdir::DirEntry::into_path)
        .ok_or_else(|| SolutionError::DescriptorNotFound {
            file,
            root: root.to_path_buf(),
        })
}

#[derive(Debug, Deserialize)]
struct DescriptorFile {
    build: BuildSection,
}

#[derive(Debug, Deserialize)]
struct BuildSection {
    #[serde(default)]
    device: Option<String>,
    #[serde(rename = "output-dirs", default)]
    output_dirs: Option<OutputDirs>,
    #[serde(default)]
    output: Vec<OutputEntry>,
}

#[derive(Debug, Deserialize)]
struct OutputDirs {
    outdir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputEntry {
    #[serde(rename = "type")]
    kind: String,
    file: String,
}

/// What a `<context>.cbuild.yml` says about the build output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CbuildDescriptor {
    /// Descriptor file location
    pub path: PathBuf,
    /// Device string, e.g. `Alif Semiconductor::AE722F80F55D5LS:M55_HE`
    pub device: String,
    /// Output directory, relative to the descriptor
    pub outdir: String,
    /// File name of the `bin` output
    pub bin_file: String,
}

impl CbuildDescriptor {
    /// Read and validate a descriptor
    pub fn load(path: &Path) -> Result<Self, SolutionError> {
        let content = fs::read_to_string(path).map_err(|e| SolutionError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    /// Parse descriptor YAML; `path` is only used for errors and relative paths
    pub fn parse(path: &Path, content: &str) -> Result<Self, SolutionError> {
        let invalid = |error: String| SolutionError::DescriptorInvalid {
            path: path.to_path_buf(),
            error,
        };

        let file: DescriptorFile =
            serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;

        let bin_file = file
            .build
            .output
            .into_iter()
            .find(|o| o.kind == "bin")
            .map(|o| o.file)
            .ok_or_else(|| invalid("no 'bin' entry in build.output".to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            device: file.build.device.unwrap_or_default(),
            outdir: file
                .build
                .output_dirs
                .and_then(|d| d.outdir)
                .unwrap_or_default(),
            bin_file,
        })
    }

    /// Directory the binary was written to
    pub fn bin_dir(&self) -> PathBuf {
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        base.join(&self.outdir)
    }

    /// Full path of the built binary
    pub fn bin_path(&self) -> PathBuf {
        self.bin_dir().join(&self.bin_file)
    }

    /// Device identity parsed from the device string
    pub fn device_id(&self) -> DeviceId {
        DeviceId::parse(&self.device)
    }
}

/// Identity fragments of a `Vendor::PART:CORE` device string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId {
    /// Last `:`-separated segment (`M55_HE`), used as a config hint
    pub core_hint: String,
    /// Part-qualified core (`AE722F80F55D5LS:M55_HE`), or the core hint
    /// when the string has no vendor prefix
    pub target_core: String,
}

impl DeviceId {
    /// Split a device string
    pub fn parse(device: &str) -> Self {
        let core_hint = device.rsplit(':').next().unwrap_or_default().to_string();
        let target_core = device
            .split_once("::")
            .map_or_else(|| core_hint.clone(), |(_, rest)| rest.to_string());
        Self {
            core_hint,
            target_core,
        }
    }
}

/// Most recently modified `.bin` under `<root>/out`
///
/// Signed outputs are skipped. Only used when neither the descriptor nor the
/// conventional path yields a binary.
pub fn find_recent_bin(root: &Path) -> Option<PathBuf> {
    let out = root.join("out");
    let found = WalkDir::new(&out)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name().to_str().is_some_and(|n| {
                n.ends_with(".bin") && !n.contains("alif-img") && !n.contains("AppTocPackage")
            })
        })
        .filter_map(|e| {
            let modified = e.metadata().ok()?.modified().ok()?;
            Some((modified, e.into_path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path);

    if let Some(path) = &found {
        tracing::warn!(
            "Falling back to the most recently built binary: {}",
            path.display()
        );
    }
    found
}

/// Locate the built binary for `context`
///
/// Descriptor first, then the conventional path, then the newest binary
/// under `out/`.
pub fn locate_artifact(root: &Path, context: &BuildContext) -> Result<PathBuf, SolutionError> {
    match find_descriptor(root, context).and_then(|p| CbuildDescriptor::load(&p)) {
        Ok(descriptor) => {
            let bin = descriptor.bin_path();
            if bin.is_file() {
                return Ok(bin);
            }
            tracing::debug!(
                "Descriptor names {} but it does not exist",
                bin.display()
            );
        }
        Err(e) => tracing::debug!("No usable build descriptor: {e}"),
    }

    let conventional = conventional_artifact_path(root, context);
    if conventional.is_file() {
        return Ok(conventional);
    }

    find_recent_bin(root).ok_or_else(|| SolutionError::BinaryNotFound {
        context: context.to_string(),
    })
}
