//! Configuration constants
//!
//! File names, directory layouts and timeouts shared by the core pipeline.
//! Runtime configuration (tool paths) lives in [`crate::core::tool_config`].

pub mod defaults;
