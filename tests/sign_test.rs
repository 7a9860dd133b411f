//! Integration tests for the staging and signing protocol
//!
//! The toolkit is a directory of shell scripts, so these only run on unix.

#![cfg(unix)]

mod common;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use alif::core::device_sync::{current_device, SyncOutcome};
use alif::core::selector::BatchSelector;
use alif::core::signer::{SignRequest, Signer};
use alif::core::tool_config::ToolConfig;
use alif::error::{SignError, ToolError};
use walkdir::WalkDir;

use common::{fake_toolkit, TestProject, HE_CONFIG, HP_CONFIG, PART};

fn tool_config(toolkit: &Path) -> ToolConfig {
    ToolConfig {
        alif_tools_path: Some(toolkit.to_path_buf()),
        ..ToolConfig::default()
    }
}

fn setup() -> TestProject {
    let project = TestProject::new();
    project.create_file(".alif/m55_he_cfg.json", HE_CONFIG);
    project.create_file(".alif/m55_hp_cfg.json", HP_CONFIG);
    project.create_file("out/blinky/E7-HE/debug/blinky.bin", "raw app");
    project
}

#[tokio::test]
async fn test_sign_retrieves_artifacts_and_cleans_toolkit() {
    let project = setup();
    let toolkit = fake_toolkit(&project);
    let config = tool_config(&toolkit);
    let signer = Signer::new(&config, &BatchSelector).unwrap();

    let root = project.path();
    let build_dir = root.join("out/blinky/E7-HE/debug");
    let binary = build_dir.join("blinky.bin");
    let request = SignRequest {
        project_dir: &root,
        build_dir: &build_dir,
        binary: &binary,
        core_hint: Some("M55_HE"),
        project_hint: Some("blinky"),
        config_override: None,
        target_core: Some("AE722F80F55D5LS:M55_HE"),
    };

    let outcome = signer.sign_artifact(&request).await.unwrap();

    assert_eq!(outcome.toc, build_dir.join("AppTocPackage.bin"));
    assert!(outcome.config_path.ends_with("m55_he_cfg.json"));
    assert!(build_dir.join("AppTocPackage.bin.sign").is_file());
    assert!(build_dir.join("AppTocPackage.bin.crt").is_file());
    assert!(build_dir.join("alif-img.bin").is_file());
    assert!(build_dir.join("alif-img.bin.sign").is_file());
    assert!(build_dir.join("app-package-map.txt").is_file());
    assert_eq!(fs::read_to_string(&binary).unwrap(), "raw app");

    assert!(!toolkit.join("alif-staged-config.json").exists());
    assert!(!toolkit.join("alif-img.bin").exists());
    assert!(!toolkit.join("build/images/alif-img.bin").exists());
    assert!(!toolkit.join("build/AppTocPackage.bin").exists());

    assert!(matches!(outcome.device_sync, Some(SyncOutcome::Updated { .. })));
    let device = current_device(&toolkit).unwrap();
    assert_eq!(device.part.as_deref(), Some(PART));
    assert_eq!(device.revision.as_deref(), Some("B2"));
}

/// Toolkit contents by relative path, tool logs excluded
fn toolkit_snapshot(toolkit: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(toolkit)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(true, |ext| ext != "log"))
        .map(|e| {
            let rel = e.path().strip_prefix(toolkit).unwrap().to_string_lossy().to_string();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn assert_nothing_staged(toolkit: &Path) {
    let snapshot = toolkit_snapshot(toolkit);
    let staged: Vec<&String> = snapshot
        .keys()
        .filter(|rel| {
            rel.starts_with("build/")
                || rel.starts_with("alif-img.bin")
                || rel.as_str() == "alif-staged-config.json"
        })
        .collect();
    assert!(staged.is_empty(), "left in toolkit: {staged:?}");
}

#[tokio::test]
async fn test_sign_twice_is_idempotent() {
    let project = setup();
    let toolkit = fake_toolkit(&project);
    let config = tool_config(&toolkit);
    let signer = Signer::new(&config, &BatchSelector).unwrap();

    let root = project.path();
    let build_dir = root.join("out/blinky/E7-HE/debug");
    let binary = build_dir.join("blinky.bin");
    let request = SignRequest {
        project_dir: &root,
        build_dir: &build_dir,
        binary: &binary,
        core_hint: Some("M55_HE"),
        project_hint: None,
        config_override: None,
        target_core: Some("AE722F80F55D5LS:M55_HE"),
    };

    let first = signer.sign_artifact(&request).await.unwrap();
    let toc_first = fs::read(&first.toc).unwrap();
    let toolkit_first = toolkit_snapshot(&toolkit);
    let build_first = toolkit_snapshot(&build_dir);
    assert_nothing_staged(&toolkit);

    let second = signer.sign_artifact(&request).await.unwrap();
    assert_nothing_staged(&toolkit);

    assert_eq!(toc_first, b"toc\nraw app");
    assert_eq!(fs::read(&second.toc).unwrap(), toc_first);
    assert_eq!(toolkit_snapshot(&toolkit), toolkit_first);
    assert_eq!(toolkit_snapshot(&build_dir), build_first);
    assert!(matches!(
        second.device_sync,
        Some(SyncOutcome::AlreadyCurrent { .. })
    ));
}

#[tokio::test]
async fn test_ambiguous_config_in_batch_mode() {
    let project = setup();
    let toolkit = fake_toolkit(&project);
    let config = tool_config(&toolkit);
    let signer = Signer::new(&config, &BatchSelector).unwrap();

    let root = project.path();
    let build_dir = root.join("out/blinky/E7-HE/debug");
    let binary = build_dir.join("blinky.bin");
    let request = SignRequest {
        project_dir: &root,
        build_dir: &build_dir,
        binary: &binary,
        core_hint: None,
        project_hint: None,
        config_override: None,
        target_core: None,
    };

    let err = signer.sign_artifact(&request).await.unwrap_err();
    assert!(err.to_string().contains("Ambiguous"));
    assert!(!toolkit.join("gen-toc.log").exists());
}

#[tokio::test]
async fn test_tool_failure_surfaces_output_and_cleans_up() {
    let project = setup();
    let toolkit = fake_toolkit(&project);
    project.create_script(
        "toolkit/app-gen-toc",
        "echo 'ERROR: OEM key not found in cert/'; exit 2",
    );
    let config = tool_config(&toolkit);
    let signer = Signer::new(&config, &BatchSelector).unwrap();

    let root = project.path();
    let build_dir = root.join("out/blinky/E7-HE/debug");
    let binary = build_dir.join("blinky.bin");
    let explicit = root.join(".alif/m55_he_cfg.json");
    let request = SignRequest {
        project_dir: &root,
        build_dir: &build_dir,
        binary: &binary,
        core_hint: None,
        project_hint: None,
        config_override: Some(&explicit),
        target_core: None,
    };

    let err = signer.sign_artifact(&request).await.unwrap_err();
    match &err {
        SignError::Tool(ToolError::Failed { output, .. }) => {
            assert!(output.contains("ERROR: OEM key not found in cert/"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!toolkit.join("alif-staged-config.json").exists());
    assert!(!toolkit.join("alif-img.bin").exists());
    assert!(binary.is_file());
}

#[tokio::test]
async fn test_missing_toc_is_fatal() {
    let project = setup();
    let toolkit = fake_toolkit(&project);
    project.create_script("toolkit/app-gen-toc", "echo 'nothing to do'");
    let config = tool_config(&toolkit);
    let signer = Signer::new(&config, &BatchSelector).unwrap();

    let root = project.path();
    let build_dir = root.join("out/blinky/E7-HE/debug");
    let binary = build_dir.join("blinky.bin");
    let explicit = root.join(".alif/m55_hp_cfg.json");
    let request = SignRequest {
        project_dir: &root,
        build_dir: &build_dir,
        binary: &binary,
        core_hint: None,
        project_hint: None,
        config_override: Some(&explicit),
        target_core: None,
    };

    assert!(matches!(
        signer.sign_artifact(&request).await,
        Err(SignError::TocMissing { .. })
    ));
}

#[tokio::test]
async fn test_device_sync_failure_is_a_warning() {
    let project = setup();
    let toolkit = fake_toolkit(&project);
    fs::remove_file(toolkit.join("utils/devicesDB.db")).unwrap();
    let config = tool_config(&toolkit);
    let signer = Signer::new(&config, &BatchSelector).unwrap();

    let root = project.path();
    let build_dir = root.join("out/blinky/E7-HE/debug");
    let binary = build_dir.join("blinky.bin");
    let request = SignRequest {
        project_dir: &root,
        build_dir: &build_dir,
        binary: &binary,
        core_hint: Some("HE"),
        project_hint: None,
        config_override: None,
        target_core: Some("AE722F80F55D5LS:M55_HE"),
    };

    let outcome = signer.sign_artifact(&request).await.unwrap();
    assert!(outcome.device_sync.is_none());
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("devicesDB.db"));
}
