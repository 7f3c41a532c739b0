//! Platform-specific directory management
//!
//! Provides the config, data and user (sketchbook) directories.
//! Follows XDG conventions on Linux and standard locations on macOS.
//!
//! Environment variables can override default directories:
//! - `BOARDSMITH_CONFIG_DIR` - Override config directory
//! - `BOARDSMITH_DATA_DIR` - Override data directory (installed packages)
//! - `BOARDSMITH_USER_DIR` - Override user directory (sketchbook)

use std::env;
use std::path::PathBuf;

/// Environment variable names for directory overrides
pub const ENV_CONFIG_DIR: &str = "BOARDSMITH_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "BOARDSMITH_DATA_DIR";
pub const ENV_USER_DIR: &str = "BOARDSMITH_USER_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "boardsmith";

/// Sketchbook folder name under the documents directory
const SKETCHBOOK_NAME: &str = "Boardsmith";

/// Platform-specific directory provider
#[derive(Debug, Clone)]
pub struct BoardsmithDirs {
    config_dir: PathBuf,
    data_dir: PathBuf,
    user_dir: PathBuf,
}

impl BoardsmithDirs {
    /// Resolve directories from the environment, then platform defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: env_or(ENV_CONFIG_DIR, platform_config_dir),
            data_dir: env_or(ENV_DATA_DIR, platform_data_dir),
            user_dir: env_or(ENV_USER_DIR, platform_user_dir),
        }
    }

    /// Use explicit directories
    #[must_use]
    pub fn from_paths(config_dir: PathBuf, data_dir: PathBuf, user_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
            user_dir,
        }
    }

    /// Replace the data and user directories with configured values
    #[must_use]
    pub fn with_overrides(mut self, data_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        if env::var_os(ENV_DATA_DIR).is_none() {
            if let Some(dir) = data_dir {
                self.data_dir = dir;
            }
        }
        if env::var_os(ENV_USER_DIR).is_none() {
            if let Some(dir) = user_dir {
                self.user_dir = dir;
            }
        }
        self
    }

    /// Config directory
    ///
    /// - Linux: `$XDG_CONFIG_HOME/boardsmith` or `~/.config/boardsmith`
    /// - macOS: `~/Library/Application Support/boardsmith`
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Data directory holding installed packages and indexes
    ///
    /// - Linux: `$XDG_DATA_HOME/boardsmith` or `~/.local/share/boardsmith`
    /// - macOS: `~/Library/Application Support/boardsmith`
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// User directory (sketchbook) with `hardware/` and `libraries/`
    #[must_use]
    pub fn user_dir(&self) -> PathBuf {
        self.user_dir.clone()
    }

    /// Global config file path
    #[must_use]
    pub fn global_config_path(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Installed packages root
    #[must_use]
    pub fn packages_dir(&self) -> PathBuf {
        self.data_dir.join("packages")
    }

    /// Sketchbook libraries folder
    #[must_use]
    pub fn user_libraries_dir(&self) -> PathBuf {
        self.user_dir.join("libraries")
    }

    /// Sketchbook hardware folder
    #[must_use]
    pub fn user_hardware_dir(&self) -> PathBuf {
        self.user_dir.join("hardware")
    }
}

impl Default for BoardsmithDirs {
    fn default() -> Self {
        Self::new()
    }
}

fn env_or(var: &str, fallback: fn() -> PathBuf) -> PathBuf {
    env::var_os(var).map_or_else(fallback, PathBuf::from)
}

fn platform_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| home().join(".config").join(APP_NAME))
}

fn platform_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| home().join(".local").join("share").join(APP_NAME))
}

fn platform_user_dir() -> PathBuf {
    dirs::document_dir()
        .map(|p| p.join(SKETCHBOOK_NAME))
        .unwrap_or_else(|| home().join(SKETCHBOOK_NAME))
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_new_creates_instance() {
        let dirs = BoardsmithDirs::new();
        assert!(!dirs.config_dir().as_os_str().is_empty());
        assert!(!dirs.data_dir().as_os_str().is_empty());
        assert!(!dirs.user_dir().as_os_str().is_empty());
    }

    #[test]
    fn test_derived_paths() {
        let dirs = BoardsmithDirs::from_paths("/c".into(), "/d".into(), "/u".into());
        assert_eq!(dirs.global_config_path(), PathBuf::from("/c/config.toml"));
        assert_eq!(dirs.packages_dir(), PathBuf::from("/d/packages"));
        assert_eq!(dirs.user_libraries_dir(), PathBuf::from("/u/libraries"));
        assert_eq!(dirs.user_hardware_dir(), PathBuf::from("/u/hardware"));
    }
}
