//! CLI command implementation for `alif version`

/// Package version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `(label, value)` pairs of build metadata, skipping anything not recorded
pub fn build_info() -> Vec<(&'static str, &'static str)> {
    [
        ("Commit", option_env!("VERGEN_GIT_SHA")),
        ("Commit date", option_env!("VERGEN_GIT_COMMIT_TIMESTAMP")),
        ("Dirty", option_env!("VERGEN_GIT_DIRTY")),
        ("Built", option_env!("VERGEN_BUILD_TIMESTAMP")),
        ("Target", option_env!("VERGEN_CARGO_TARGET_TRIPLE")),
        ("Rustc", option_env!("VERGEN_RUSTC_SEMVER")),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.filter(|v| !v.is_empty()).map(|v| (label, v)))
    .collect()
}

/// Execute the version command
pub fn execute() {
    println!("alif {VERSION}");
    for (label, value) in build_info() {
        println!("  {label:<12} {value}");
    }
}
