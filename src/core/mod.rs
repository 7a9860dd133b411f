//! Core business logic module
//!
//! Resolution and staging pipeline for Alif Ensemble firmware. Process
//! execution, filesystem helpers and port enumeration live in
//! [`crate::infra`].
//!
//! # Submodules
//!
//! - [`tool_config`] - Persisted tool paths and timeouts
//! - [`selector`] - Disambiguation between candidates
//! - [`build_env`] - Toolchain environment for `cbuild`
//! - [`solution`] - Solution and build-output descriptor lookup
//! - [`context`] - Build context parsing and resolution
//! - [`builder`] - Solution builds
//! - [`target_config`] - Signing configuration discovery
//! - [`device_sync`] - Toolkit device identity synchronization
//! - [`signer`] - Artifact staging and TOC signing
//! - [`map_file`] - Package map parsing
//! - [`build_state`] - Persisted build outcome
//! - [`flash`] - ISP and JTAG programming
//! - [`recover`] - Boot signature recovery

pub mod build_env;
pub mod build_state;
pub mod builder;
pub mod context;
pub mod device_sync;
pub mod flash;
pub mod map_file;
pub mod recover;
pub mod selector;
pub mod signer;
pub mod solution;
pub mod target_config;
pub mod tool_config;
