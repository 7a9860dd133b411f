//! Infrastructure layer
//!
//! Handles all I/O operations: filesystem, external processes and serial
//! port enumeration.

pub mod dirs;
pub mod filesystem;
pub mod process;
pub mod serial;
