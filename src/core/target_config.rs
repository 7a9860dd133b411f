//! Signing configuration discovery
//!
//! Signing configurations are JSON files whose top-level keys name hardware
//! images (`USER_APP`, `ETHOS_A`, ...). Each image object may carry `binary`,
//! `mramAddress` and `cpu_id`. The raw map is kept as is; typed accessors
//! pull the fields callers care about.
//!
//! Resolution order:
//! 1. An explicit path is authoritative.
//! 2. Otherwise `.alif/`, `build/config/` and the search root are scanned.
//! 3. Several candidates are narrowed by the core hint, then the project hint,
//!    matched against file names and CPU ids. A hint that matches nothing is
//!    ignored with a warning.
//! 4. Anything still ambiguous goes to the [`Selector`].

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::selector::Selector;
use crate::error::TargetConfigError;

/// Top-level key holding the application image
const USER_APP: &str = "USER_APP";

/// Directories scanned below the search root, in order
const SEARCH_DIRS: &[&str] = &[".alif", "build/config", ""];

/// File names that are JSON but never signing configurations
fn is_excluded(name: &str) -> bool {
    name.contains("device-config") || name == "vcpkg-configuration.json"
}

/// A parsed signing configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    raw: Map<String, Value>,
}

impl TargetConfig {
    /// Parse JSON text; the document must be an object
    pub fn parse(path: &Path, content: &str) -> Result<Self, TargetConfigError> {
        let value: Value = serde_json::from_str(content).map_err(|e| TargetConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        match value {
            Value::Object(raw) => Ok(Self { raw }),
            _ => Err(TargetConfigError::Parse {
                path: path.to_path_buf(),
                error: "top level is not a JSON object".to_string(),
            }),
        }
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self, TargetConfigError> {
        let content = fs::read_to_string(path).map_err(|e| TargetConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::parse(path, &content)
    }

    /// String field, looked up under `USER_APP` first, then in every
    /// top-level object in document order
    fn field(&self, key: &str) -> Option<&str> {
        fn from<'v>(v: &'v Value, key: &str) -> Option<&'v str> {
            v.as_object()?.get(key)?.as_str()
        }

        self.raw
            .get(USER_APP)
            .and_then(|v| from(v, key))
            .or_else(|| self.raw.values().find_map(|v| from(v, key)))
    }

    /// `cpu_id` of the application image
    pub fn cpu(&self) -> Option<&str> {
        self.field("cpu_id").filter(|s| !s.is_empty())
    }

    /// `mramAddress` of the application image
    pub fn mram_address(&self) -> Option<&str> {
        self.field("mramAddress").filter(|s| !s.is_empty())
    }

    /// Toolkit-relative `binary` path the signing tool reads its input from
    pub fn binary_field(&self, path: &Path) -> Result<&str, TargetConfigError> {
        self.field("binary")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TargetConfigError::MissingField {
                path: path.to_path_buf(),
                field: "binary".to_string(),
            })
    }

    /// Whether the document carries a CPU id or a load address
    pub fn is_candidate(&self) -> bool {
        self.cpu().is_some() || self.mram_address().is_some()
    }
}

/// Inputs to a resolution
#[derive(Debug, Clone, Default)]
pub struct ConfigQuery<'a> {
    /// Explicit file; skips discovery
    pub explicit: Option<&'a Path>,
    /// Root of the auto-detect scan
    pub search_root: Option<&'a Path>,
    /// Core name fragment (`M55_HE`)
    pub core_hint: Option<&'a str>,
    /// Project name fragment
    pub project_hint: Option<&'a str>,
}

/// The directories scanned for `root`, in order
pub fn search_dirs(root: &Path) -> Vec<PathBuf> {
    SEARCH_DIRS
        .iter()
        .map(|d| if d.is_empty() { root.to_path_buf() } else { root.join(d) })
        .collect()
}

/// A discovered configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// File location
    pub path: PathBuf,
    /// Its `cpu_id`, if any
    pub cpu: Option<String>,
}

impl Candidate {
    /// Whether the file name or CPU id contains `needle` (already lowercase)
    fn matches(&self, needle: &str) -> bool {
        file_name(&self.path).to_lowercase().contains(needle)
            || self
                .cpu
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(needle))
    }
}

/// Every qualifying configuration under the search directories
///
/// Unreadable or non-qualifying JSON files are skipped.
pub fn discover(root: &Path) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for dir in search_dirs(root) {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
            .collect();
        files.sort();

        for file in files {
            if is_excluded(&file_name(&file)) {
                continue;
            }
            match TargetConfig::load(&file) {
                Ok(cfg) if cfg.is_candidate() => candidates.push(Candidate {
                    cpu: cfg.cpu().map(str::to_string),
                    path: file,
                }),
                Ok(_) => tracing::debug!("{} has no cpu_id or mramAddress", file.display()),
                Err(e) => tracing::debug!("Skipping {}: {e}", file.display()),
            }
        }
    }

    candidates
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Keep candidates whose file name or CPU id contains `hint`,
/// case-insensitively
///
/// Returns `None` when the hint is empty or matches nothing, leaving the
/// caller's set untouched.
pub fn narrow_by_hint(candidates: &[Candidate], hint: &str) -> Option<Vec<Candidate>> {
    if hint.is_empty() {
        return None;
    }
    let needle = hint.to_lowercase();
    let narrowed: Vec<Candidate> = candidates
        .iter()
        .filter(|c| c.matches(&needle))
        .cloned()
        .collect();
    (!narrowed.is_empty()).then_some(narrowed)
}

/// Resolve a signing configuration
pub fn resolve(
    query: &ConfigQuery<'_>,
    selector: &dyn Selector,
) -> Result<(TargetConfig, PathBuf), TargetConfigError> {
    if let Some(path) = query.explicit {
        let config = TargetConfig::load(path)?;
        tracing::info!("Configuration source: explicit file {}", path.display());
        return Ok((config, path.to_path_buf()));
    }

    let root = query.search_root.unwrap_or_else(|| Path::new("."));
    let mut candidates = discover(root);

    if candidates.is_empty() {
        return Err(TargetConfigError::NotFound {
            searched: search_dirs(root),
        });
    }

    for (label, hint) in [("core", query.core_hint), ("project", query.project_hint)] {
        if candidates.len() <= 1 {
            break;
        }
        let Some(hint) = hint.filter(|h| !h.is_empty()) else {
            continue;
        };
        match narrow_by_hint(&candidates, hint) {
            Some(narrowed) => {
                if narrowed.len() == 1 {
                    tracing::info!(
                        "Auto-selected config based on {label} hint '{hint}': {}",
                        file_name(&narrowed[0].path)
                    );
                }
                candidates = narrowed;
            }
            None => tracing::warn!(
                "{label} hint '{hint}' matches none of {} configuration files; ignoring it",
                candidates.len()
            ),
        }
    }

    let path = if candidates.len() == 1 {
        candidates.swap_remove(0).path
    } else {
        let names: Vec<String> = candidates
            .iter()
            .map(|c| c.path.display().to_string())
            .collect();
        let index = selector.select("configuration file", &names)?;
        candidates.swap_remove(index).path
    };

    let config = TargetConfig::load(&path)?;
    tracing::info!("Configuration source: auto-detected {}", path.display());
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selector::{BatchSelector, FixedSelector};
    use crate::error::SelectError;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn cfg(cpu: &str) -> String {
        format!(
            r#"{{"DEVICE": {{"disabled": false}}, "USER_APP": {{"binary": "build/images/app.bin", "mramAddress": "0x80000000", "cpu_id": "{cpu}"}}}}"#
        )
    }

    #[test]
    fn test_accessors_prefer_user_app() {
        let json = r#"{"ETHOS": {"cpu_id": "M55_HP"}, "USER_APP": {"cpu_id": "M55_HE", "binary": "app.bin"}}"#;
        let c = TargetConfig::parse(Path::new("x.json"), json).unwrap();
        assert_eq!(c.cpu(), Some("M55_HE"));
        assert_eq!(c.binary_field(Path::new("x.json")).unwrap(), "app.bin");
        assert_eq!(c.mram_address(), None);
    }

    #[test]
    fn test_accessors_scan_other_images() {
        let json = r#"{"A32_APP": {"mramAddress": "0x80100000", "binary": "build/images/a.bin"}}"#;
        let c = TargetConfig::parse(Path::new("x.json"), json).unwrap();
        assert_eq!(c.mram_address(), Some("0x80100000"));
        assert!(c.is_candidate());
    }

    #[test]
    fn test_missing_binary_field() {
        let c = TargetConfig::parse(Path::new("x.json"), r#"{"USER_APP": {"cpu_id": "M55_HE"}}"#)
            .unwrap();
        assert!(matches!(
            c.binary_field(Path::new("x.json")),
            Err(TargetConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_non_object_is_parse_error() {
        assert!(matches!(
            TargetConfig::parse(Path::new("x.json"), "[1, 2]"),
            Err(TargetConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_discover_scans_dirs_in_order_and_filters() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let a = write(&root.join(".alif"), "m55_he_cfg.json", &cfg("M55_HE"));
        let b = write(&root.join("build/config"), "m55_hp_cfg.json", &cfg("M55_HP"));
        write(root, "device-config.json", &cfg("M55_HE"));
        write(root, "vcpkg-configuration.json", &cfg("M55_HE"));
        write(root, "package.json", r#"{"name": "not a config"}"#);
        write(root, "broken.json", "{");

        let found: Vec<PathBuf> = discover(root).into_iter().map(|c| c.path).collect();
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn test_explicit_path_is_authoritative() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "anything.json", r#"{"OTHER": {}}"#);
        let query = ConfigQuery {
            explicit: Some(&path),
            core_hint: Some("HE"),
            ..ConfigQuery::default()
        };
        let (_, resolved) = resolve(&query, &BatchSelector).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn test_explicit_path_unreadable() {
        let query = ConfigQuery {
            explicit: Some(Path::new("/nonexistent/cfg.json")),
            ..ConfigQuery::default()
        };
        assert!(matches!(
            resolve(&query, &BatchSelector),
            Err(TargetConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_nothing_found_lists_searched_dirs() {
        let temp = TempDir::new().unwrap();
        let query = ConfigQuery {
            search_root: Some(temp.path()),
            ..ConfigQuery::default()
        };
        match resolve(&query, &BatchSelector).unwrap_err() {
            TargetConfigError::NotFound { searched } => assert_eq!(searched.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_project_hint_breaks_tie_after_core_hint() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "blinky_m55_he.json", &cfg("M55_HE"));
        let hello = write(temp.path(), "hello_m55_he.json", &cfg("M55_HE"));
        write(temp.path(), "hello_m55_hp.json", &cfg("M55_HP"));

        let query = ConfigQuery {
            search_root: Some(temp.path()),
            core_hint: Some("M55_HE"),
            project_hint: Some("Hello"),
            ..ConfigQuery::default()
        };
        let (_, path) = resolve(&query, &BatchSelector).unwrap();
        assert_eq!(path, hello);
    }

    #[test]
    fn test_core_hint_matches_cpu_id() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a_cfg.json", &cfg("M55_HE"));
        write(temp.path(), "b_cfg.json", &cfg("M55_HP"));

        let query = ConfigQuery {
            search_root: Some(temp.path()),
            core_hint: Some("HE"),
            ..ConfigQuery::default()
        };
        let (config, path) = resolve(&query, &BatchSelector).unwrap();
        assert_eq!(path, a);
        assert_eq!(config.cpu(), Some("M55_HE"));
    }

    #[test]
    fn test_unmatched_hint_keeps_candidates_for_selection() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a_cfg.json", &cfg("M55_HE"));
        let b = write(temp.path(), "b_cfg.json", &cfg("M55_HP"));

        let query = ConfigQuery {
            search_root: Some(temp.path()),
            core_hint: Some("XYZ"),
            ..ConfigQuery::default()
        };
        let (_, path) = resolve(&query, &FixedSelector(1)).unwrap();
        assert_eq!(path, b);

        match resolve(&query, &BatchSelector).unwrap_err() {
            TargetConfigError::Selection(SelectError::Ambiguous { candidates, .. }) => {
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
