//! Infrastructure layer
//!
//! Handles all I/O operations: filesystem, hardware folder scanning and
//! external processes.

pub mod dirs;
pub mod filesystem;
pub mod hardware;
pub mod process;
