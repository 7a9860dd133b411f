//! Toolkit device identity synchronization
//!
//! The security toolkit signs and programs for whatever device its global
//! configuration (`utils/global-cfg.db`) names. Before signing, that device
//! is pointed at the part being built for:
//!
//! - `utils/devicesDB.db` maps part numbers to a feature set,
//! - `utils/featuresDB.db` lists the revisions valid for each feature set,
//! - `utils/global-cfg.db` holds the current `DEVICE.Part#` and `Revision`.
//!
//! The global file is only rewritten when the part or revision changes.
//! Unrelated keys in it are preserved in their original order.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::config::defaults;
use crate::error::DeviceSyncError;

const DEVICE_KEY: &str = "DEVICE";
const PART_KEY: &str = "Part#";
const REVISION_KEY: &str = "Revision";

/// Result of a synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The global configuration was rewritten
    Updated {
        /// New part number
        part: String,
        /// New revision
        revision: String,
    },
    /// The toolkit already pointed at this part and revision
    AlreadyCurrent {
        /// Current part number
        part: String,
        /// Current revision
        revision: String,
    },
}

/// Device currently configured in the toolkit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolkitDevice {
    /// `Part#`
    pub part: Option<String>,
    /// `Revision`
    pub revision: Option<String>,
}

fn read_json(path: &Path) -> Result<Map<String, Value>, DeviceSyncError> {
    let content = fs::read_to_string(path).map_err(|e| DeviceSyncError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    match serde_json::from_str(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DeviceSyncError::Parse {
            path: path.to_path_buf(),
            error: "top level is not a JSON object".to_string(),
        }),
        Err(e) => Err(DeviceSyncError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}

/// Part fragment of a target (`AE722F80F55D5LS:M55_HE` gives `AE722F80F55D5LS`)
pub fn part_identifier(target_core: &str) -> &str {
    target_core
        .split_once(':')
        .map_or(target_core, |(part, _)| part)
        .trim()
}

/// Full part number for `identifier`
///
/// An exact (case-insensitive) key wins; otherwise the first key in file
/// order containing the identifier.
pub fn find_part<'a>(devices: &'a Map<String, Value>, identifier: &str) -> Option<&'a str> {
    let needle = identifier.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    devices
        .keys()
        .find(|k| k.to_lowercase() == needle)
        .or_else(|| devices.keys().find(|k| k.to_lowercase().contains(&needle)))
        .map(String::as_str)
}

/// Revision to configure for a feature set
///
/// The current revision is kept when still valid, otherwise the first
/// listed one, otherwise [`defaults::FALLBACK_REVISION`].
pub fn pick_revision(revisions: &[String], current: Option<&str>) -> String {
    if let Some(current) = current.filter(|c| revisions.iter().any(|r| r == c)) {
        return current.to_string();
    }
    revisions
        .first()
        .cloned()
        .unwrap_or_else(|| defaults::FALLBACK_REVISION.to_string())
}

fn revisions_for(features: &Map<String, Value>, feature_set: &str) -> Vec<String> {
    features
        .get(feature_set)
        .and_then(|f| f.get("revisions"))
        .and_then(Value::as_array)
        .map(|revs| {
            revs.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn global_cfg_path(toolkit: &Path) -> PathBuf {
    toolkit.join(defaults::GLOBAL_CFG_DB)
}

/// Device the toolkit is currently configured for
pub fn current_device(toolkit: &Path) -> Result<ToolkitDevice, DeviceSyncError> {
    let global = read_json(&global_cfg_path(toolkit))?;
    let device = global.get(DEVICE_KEY);
    let field = |key: &str| {
        device
            .and_then(|d| d.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Ok(ToolkitDevice {
        part: field(PART_KEY),
        revision: field(REVISION_KEY),
    })
}

/// Point the toolkit's global configuration at the part of `target_core`
pub fn sync_toolkit_device(
    toolkit: &Path,
    target_core: &str,
) -> Result<SyncOutcome, DeviceSyncError> {
    let devices_path = toolkit.join(defaults::DEVICE_DB);
    let devices = read_json(&devices_path)?;

    let identifier = part_identifier(target_core);
    let part = find_part(&devices, identifier)
        .ok_or_else(|| DeviceSyncError::PartNotFound {
            identifier: identifier.to_string(),
            path: devices_path.clone(),
        })?
        .to_string();

    let feature_set = devices
        .get(&part)
        .and_then(|d| d.get("featureSet"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let features = read_json(&toolkit.join(defaults::FEATURE_DB))?;
    let revisions = revisions_for(&features, feature_set);

    let global_path = global_cfg_path(toolkit);
    let mut global = read_json(&global_path)?;
    let current = current_device(toolkit)?;
    let revision = pick_revision(&revisions, current.revision.as_deref());

    if current.part.as_deref() == Some(part.as_str())
        && current.revision.as_deref() == Some(revision.as_str())
    {
        tracing::info!("Toolkit device already current: {part} rev {revision}");
        return Ok(SyncOutcome::AlreadyCurrent { part, revision });
    }

    let device = global
        .entry(DEVICE_KEY.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !device.is_object() {
        *device = Value::Object(Map::new());
    }
    if let Some(obj) = device.as_object_mut() {
        obj.insert(PART_KEY.to_string(), Value::String(part.clone()));
        obj.insert(REVISION_KEY.to_string(), Value::String(revision.clone()));
    }

    let content =
        serde_json::to_string_pretty(&Value::Object(global)).map_err(|e| DeviceSyncError::Write {
            path: global_path.clone(),
            error: e.to_string(),
        })?;
    fs::write(&global_path, content + "\n").map_err(|e| DeviceSyncError::Write {
        path: global_path.clone(),
        error: e.to_string(),
    })?;

    tracing::info!(
        "Toolkit device set to {part} rev {revision} (was {} rev {})",
        current.part.as_deref().unwrap_or("-"),
        current.revision.as_deref().unwrap_or("-")
    );
    Ok(SyncOutcome::Updated { part, revision })
}
