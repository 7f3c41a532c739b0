//! Boardsmith - firmware builder for embedded boards
//!
//! Resolves fully qualified board names against installed hardware
//! packages, selects the toolchains a board needs and drives the
//! platform's recipes through a staged build pipeline.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Registry, resolution and build pipeline
//! - [`infra`] - Infrastructure layer (filesystem, hardware folders, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
