//! Global configuration management
//!
//! Reads `config.toml` from the config directory. A missing file means
//! defaults; a file that does not parse is an error.
//!
//! ```toml
//! [directories]
//! data = "/opt/boardsmith"
//! user = "/home/me/Boardsmith"
//!
//! [index]
//! files = ["/opt/boardsmith/package_acme_index.json"]
//!
//! [build]
//! verbose = true
//! warnings = "all"
//! jobs = 8
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults::{DEFAULT_INDEX_FILE, DEFAULT_WARNINGS_LEVEL};
use crate::error::ConfigError;
use crate::infra::dirs::BoardsmithDirs;

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// Directory overrides
    #[serde(default)]
    pub directories: DirectoriesConfig,

    /// Package index files
    #[serde(default)]
    pub index: IndexConfig,

    /// Default build options
    #[serde(default)]
    pub build: BuildConfig,
}

/// Directory overrides; environment variables still take precedence
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DirectoriesConfig {
    pub data: Option<PathBuf>,
    pub user: Option<PathBuf>,
}

/// Package index configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Extra local index files, merged after the default one
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

/// Default build options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Print every command
    pub verbose: Option<bool>,

    /// Compiler warnings level (`none`, `default`, `more`, `all`)
    pub warnings: Option<String>,

    /// Value of `build.jobs` in recipes
    pub jobs: Option<usize>,
}

impl GlobalConfig {
    /// Load `config.toml` from the config directory
    pub fn load(dirs: &BoardsmithDirs) -> Result<Self, ConfigError> {
        Self::load_from_path(&dirs.global_config_path())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Index files to load: `<data>/package_index.json` then configured extras
    #[must_use]
    pub fn index_files(&self, dirs: &BoardsmithDirs) -> Vec<PathBuf> {
        let mut files = vec![dirs.data_dir().join(DEFAULT_INDEX_FILE)];
        files.extend(self.index.files.iter().cloned());
        files
    }

    /// Effective `build.jobs`
    #[must_use]
    pub fn build_jobs(&self) -> usize {
        self.build.jobs.unwrap_or_else(num_cpus::get)
    }

    /// Effective warnings level
    #[must_use]
    pub fn warnings_level(&self) -> &str {
        self.build
            .warnings
            .as_deref()
            .unwrap_or(DEFAULT_WARNINGS_LEVEL)
    }
}
