//! Core business logic module
//!
//! Registry model, FQBN and tool resolution, build property assembly and
//! the recipe pipeline. Filesystem scanning and process spawning are
//! reached through [`crate::infra`].
//!
//! # Submodules
//!
//! - [`properties`] - Ordered `key=value` maps and `{key}` expansion
//! - [`version`] - Release version ordering
//! - [`fqbn`] - Fully qualified board names
//! - [`package`] - Packages, platforms, tools and their releases
//! - [`board`] - Boards and menu option selection
//! - [`index`] - Package index files
//! - [`manager`] - Package registry queries
//! - [`resolver`] - FQBN resolution
//! - [`tools`] - Tool dependency resolution
//! - [`global_config`] - Global configuration management
//! - [`build_properties`] - Build properties assembly
//! - [`logger`] - User-facing build output
//! - [`recipe`] - Recipe expansion and execution
//! - [`pipeline`] - Stage sequences and their dispatch loop
//! - [`builder`] - The production build steps
//! - [`sketch`] - Sketch loading, merging and preprocessing
//! - [`libraries`] - Library discovery and include detection
//! - [`compilation_db`] - `compile_commands.json`
//! - [`build_options`] - Build directory invalidation
//! - [`size`] - Binary size check
//! - [`export`] - CMake project export

pub mod board;
pub mod build_options;
pub mod build_properties;
pub mod builder;
pub mod compilation_db;
pub mod export;
pub mod fqbn;
pub mod global_config;
pub mod index;
pub mod libraries;
pub mod logger;
pub mod manager;
pub mod package;
pub mod pipeline;
pub mod properties;
pub mod recipe;
pub mod resolver;
pub mod size;
pub mod sketch;
pub mod tools;
pub mod version;
