//! Alif - build, sign and flash orchestrator for Alif Ensemble firmware
//!
//! This library drives the CMSIS-Toolbox build, the Alif Security Toolkit
//! signing tools and the ISP/J-Link programmers for multi-project CMSIS
//! solutions.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Resolution, staging and flashing pipeline
//! - [`infra`] - Infrastructure layer (filesystem, processes, serial ports)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
