//! End-to-end tests of the `alif` binary
//!
//! Every run uses an isolated config directory and `ALIF_NON_INTERACTIVE=1`.

mod common;

use std::process::Output;

use assert_fs::prelude::*;
use common::TestProject;
use predicates::prelude::*;

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_version_prints_package_version() {
    let project = TestProject::new();
    let output = project.alif(&["version"]);
    assert!(output.status.success());
    assert!(predicate::str::starts_with(format!("alif {}", env!("CARGO_PKG_VERSION")))
        .eval(&stdout(&output)));
}

#[test]
fn test_setup_writes_config() {
    let project = TestProject::new();
    let toolkit = project.path().join("toolkit");
    let output = project.alif(&[
        "setup",
        "--toolkit",
        toolkit.to_str().unwrap(),
        "--pack-root",
        "/opt/packs",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let config = project.read_file(".alif-home/config.toml");
    assert!(config.contains("alif_tools_path"));
    assert!(config.contains("/opt/packs"));
    assert!(config.contains("cert"));
}

#[test]
fn test_setup_keeps_existing_values() {
    let project = TestProject::new();
    project.create_file(
        ".alif-home/config.toml",
        "alif_tools_path = \"/opt/alif\"\ngcc_toolchain_path = \"/opt/gcc/bin\"\n",
    );
    let output = project.alif(&["setup", "--pack-root", "/opt/packs"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let config = project.read_file(".alif-home/config.toml");
    assert!(config.contains("/opt/alif"));
    assert!(config.contains("/opt/gcc/bin"));
    assert!(config.contains("/opt/packs"));
}

#[test]
fn test_flash_requires_setup() {
    let project = TestProject::new();
    let output = project.alif(&["flash"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(predicate::str::contains("alif setup").eval(&stderr(&output)));
}

#[test]
fn test_flash_without_build_state() {
    let project = TestProject::new();
    project.create_file(".alif-home/config.toml", "alif_tools_path = \"/opt/alif\"\n");
    project.create_file("app.csolution.yml", "solution:\n");

    let output = project.alif(&["flash"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(predicate::str::contains("alif build --sign").eval(&stderr(&output)));
}

#[test]
fn test_flash_rejects_directory_argument() {
    let project = TestProject::new();
    project.create_file(".alif-home/config.toml", "alif_tools_path = \"/opt/alif\"\n");
    project.create_dir("out");

    let output = project.alif(&["flash", "out"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(predicate::str::contains("is a directory").eval(&stderr(&output)));
}

#[test]
fn test_build_outside_solution() {
    let project = TestProject::new();
    project.create_file(".alif-home/config.toml", "alif_tools_path = \"/opt/alif\"\n");

    let output = project.alif(&["build"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(predicate::str::contains(".csolution.yml").eval(&stderr(&output)));
}

#[test]
fn test_recover_needs_yes_when_non_interactive() {
    let project = TestProject::new();
    project.create_file(".alif-home/config.toml", "alif_tools_path = \"/opt/alif\"\n");

    let output = project.alif(&["recover", "-d", "AE722F80F55D5LS_M55_HE"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(predicate::str::contains("--yes").eval(&stderr(&output)));
}

#[test]
fn test_recover_without_device_or_state() {
    let project = TestProject::new();
    project.create_file(".alif-home/config.toml", "alif_tools_path = \"/opt/alif\"\n");

    let output = project.alif(&["recover", "--yes"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_image_missing_binary() {
    let project = TestProject::new();
    let output = project.alif(&["sign", "missing.bin"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(predicate::str::contains("missing.bin").eval(&stderr(&output)));
}

#[cfg(unix)]
#[test]
fn test_image_signs_in_place() {
    let project = TestProject::new();
    let toolkit = common::fake_toolkit(&project);
    common::write_tool_config(&project, &toolkit);
    project.create_file("fw/.alif/m55_he_cfg.json", common::HE_CONFIG);
    project.create_file("fw/app.bin", "raw app");

    let output = project.alif(&["image", "fw/app.bin"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let fw = assert_fs::fixture::ChildPath::new(project.path().join("fw"));
    fw.child("AppTocPackage.bin").assert(predicate::path::is_file());
    fw.child("alif-img.bin").assert(predicate::path::is_file());
    fw.child("app-package-map.txt").assert(predicate::path::is_file());
    fw.child("app.bin").assert("raw app");
    assert!(!toolkit.join("alif-staged-config.json").exists());
}

#[cfg(unix)]
#[test]
fn test_image_tool_failure_exits_nonzero() {
    let project = TestProject::new();
    let toolkit = common::fake_toolkit(&project);
    common::write_tool_config(&project, &toolkit);
    project.create_script("toolkit/app-gen-toc", "echo 'bad key' >&2; exit 3");
    project.create_file("fw/.alif/m55_he_cfg.json", common::HE_CONFIG);
    project.create_file("fw/app.bin", "raw app");

    let output = project.alif(&["image", "fw/app.bin"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(predicate::str::contains("bad key").eval(&stderr(&output)));
    assert!(!project.file_exists("fw/AppTocPackage.bin"));
}

#[test]
fn test_verbosity_controls_log_output() {
    let project = TestProject::new();

    let quiet = project.alif(&["flash"]);
    assert!(!stderr(&quiet).contains("using defaults"));

    let debug = project.alif(&["-vv", "flash"]);
    assert!(predicate::str::contains("using defaults").eval(&stderr(&debug)));
}
