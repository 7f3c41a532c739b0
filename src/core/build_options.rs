//! Build options snapshot
//!
//! The options that shaped a build are stored next to its outputs. When a
//! later build uses different options the build directory is wiped, since
//! objects compiled with the old options can no longer be reused.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::defaults::BUILD_OPTIONS_FILE;
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Options compared between builds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    pub fqbn: String,
    pub hardware_folders: Vec<PathBuf>,
    pub libraries_folders: Vec<PathBuf>,
    pub sketch_location: PathBuf,
    /// `key=value` overrides in declaration order
    pub custom_build_properties: Vec<String>,
    /// Platform definition the previous build used, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_file: Option<PathBuf>,
}

impl BuildOptions {
    fn to_json(&self) -> Result<String, FilesystemError> {
        serde_json::to_string_pretty(self).map_err(|e| FilesystemError::WriteFile {
            path: PathBuf::from(BUILD_OPTIONS_FILE),
            error: e.to_string(),
        })
    }
}

/// Wipe `build_path` if its stored options differ, then store `current`
///
/// A platform file newer than the stored snapshot also forces a wipe.
/// Returns whether the directory was wiped.
pub fn wipe_if_changed(build_path: &Path, current: &BuildOptions) -> Result<bool, FilesystemError> {
    let options_file = build_path.join(BUILD_OPTIONS_FILE);

    let wipe = match filesystem::read_file(&options_file) {
        Err(_) => false,
        Ok(content) => match serde_json::from_str::<BuildOptions>(&content) {
            Ok(previous) if previous == *current => current
                .platform_file
                .as_deref()
                .filter(|platform| platform.is_file())
                .is_some_and(|platform| filesystem::is_stale(&options_file, &[platform])),
            Ok(_) => true,
            Err(e) => {
                debug!("Unreadable {}: {e}", options_file.display());
                true
            }
        },
    };

    if wipe {
        debug!("Build options changed, wiping {}", build_path.display());
        filesystem::remove_dir_all(build_path)?;
    }
    filesystem::create_dir_all(build_path)?;
    filesystem::write_file(&options_file, &current.to_json()?)?;
    Ok(wipe)
}
