//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests: a temporary
//! project directory and a fake Alif toolkit whose vendor tools are shell
//! scripts that log their arguments.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Test project context
///
/// Creates a temporary directory for test projects and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a directory in the test project
    pub fn create_dir(&self, name: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path).expect("Failed to create directory");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Create an executable shell script
    #[cfg(unix)]
    pub fn create_script(&self, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        self.create_file(name, &format!("#!/bin/sh\n{body}\n"));
        let path = self.dir.path().join(name);
        let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod script");
    }

    /// Run the `alif` binary in this project with an isolated config dir
    pub fn alif(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_alif"))
            .current_dir(self.path())
            .env("ALIF_CONFIG_DIR", self.path().join(".alif-home"))
            .env("ALIF_NON_INTERACTIVE", "1")
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute alif")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Toolkit-relative directory of the fake toolkit
pub const TOOLKIT: &str = "toolkit";

/// Part the fake device database knows
pub const PART: &str = "AE722F80F55D5LS";

/// Signing configuration for the high-efficiency core
pub const HE_CONFIG: &str = r#"{
  "USER_APP": {
    "binary": "alif-img.bin",
    "version": "1.0.0",
    "cpu_id": "M55_HE",
    "mramAddress": "0x80200000",
    "flags": ["boot"]
  }
}"#;

/// Signing configuration for the high-performance core
pub const HP_CONFIG: &str = r#"{
  "USER_APP": {
    "binary": "alif-img.bin",
    "cpu_id": "M55_HP",
    "mramAddress": "0x80000000"
  }
}"#;

/// Package map the fake `app-gen-toc` writes
pub const PACKAGE_MAP: &str = "0x80200000  alif-img.bin  0x00001000  M55_HE\nAPP Package Start Address: 0x8057f0f0\n";

/// Lay out a fake toolkit under [`TOOLKIT`] and return its absolute path
#[cfg(unix)]
pub fn fake_toolkit(project: &TestProject) -> PathBuf {
    project.create_file(
        &format!("{TOOLKIT}/utils/devicesDB.db"),
        &format!(r#"{{"{PART}": {{"featureSet": "Ensemble"}}, "AE302F80F55D5LE": {{"featureSet": "E3"}}}}"#),
    );
    project.create_file(
        &format!("{TOOLKIT}/utils/featuresDB.db"),
        r#"{"Ensemble": {"revisions": ["B2", "B4"]}, "E3": {"revisions": ["A1"]}}"#,
    );
    project.create_file(
        &format!("{TOOLKIT}/utils/global-cfg.db"),
        r#"{"DEVICE": {"Part#": "AE302F80F55D5LE", "Revision": "A1"}, "ADVANCED": {"HARDWARE_INTERFACE": "UART"}}"#,
    );
    project.create_file(
        &format!("{TOOLKIT}/isp_config_data.cfg"),
        "comport /dev/ttyOLD\nbaudrate 55000\n",
    );
    project.create_file(
        &format!("{TOOLKIT}/bin/application_package.ds"),
        "set semihosting args old\nloadfile x\n",
    );

    project.create_script(
        &format!("{TOOLKIT}/app-gen-toc"),
        &format!(
            r#"echo "$@" >> gen-toc.log
test -f alif-staged-config.json || {{ echo "staged config missing"; exit 4; }}
test -f alif-img.bin || {{ echo "staged binary missing"; exit 5; }}
mkdir -p build
{{ echo toc; cat alif-img.bin; }} > build/AppTocPackage.bin
echo sig > build/AppTocPackage.bin.sign
echo crt > build/AppTocPackage.bin.crt
echo sig > alif-img.bin.sign
printf '{}' > build/app-package-map.txt
echo "Generated TOC""#,
            PACKAGE_MAP.replace('\n', "\\n")
        ),
    );
    project.create_script(
        &format!("{TOOLKIT}/app-write-mram"),
        r#"echo "$@" >> write-mram.log
echo "Burning: done""#,
    );
    project.path().join(TOOLKIT)
}

/// Write an alif `config.toml` pointing at `toolkit`
pub fn write_tool_config(project: &TestProject, toolkit: &Path) {
    project.create_file(
        ".alif-home/config.toml",
        &format!("alif_tools_path = \"{}\"\n", toolkit.display()),
    );
}
