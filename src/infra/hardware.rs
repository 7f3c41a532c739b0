//! Installed hardware discovery
//!
//! Scans the on-disk layout and marks what it finds as installed:
//!
//! - `<data>/packages/<packager>/hardware/<arch>/<version>/` platform releases
//! - `<data>/packages/<packager>/tools/<tool>/<version>/` tool releases
//! - `<user>/hardware/<packager>/<arch>/` sketchbook platforms, versioned by
//!   `platform.txt` or `0.0.0`

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::package::{Packages, PlatformRelease};
use crate::core::properties::PropertiesMap;
use crate::core::version::ReleaseVersion;
use crate::error::IndexError;
use crate::infra::filesystem;

/// Version given to sketchbook platforms without a `version` property
pub const UNVERSIONED_PLATFORM: &str = "0.0.0";

/// Scan the data and user directories and mark releases installed
pub fn load_installed(
    packages: &mut Packages,
    data_dir: &Path,
    user_dir: &Path,
) -> Result<(), IndexError> {
    let packages_dir = data_dir.join("packages");
    for (packager, package_dir) in subdirs(&packages_dir) {
        for (arch, arch_dir) in subdirs(&package_dir.join("hardware")) {
            let mut releases = subdirs(&arch_dir);
            releases.sort_by_cached_key(|(version, _)| ReleaseVersion::new(version.as_str()));
            // the latest version is loaded last and stays installed
            for (version, release_dir) in releases {
                load_platform_release(packages, &packager, &arch, &version, &release_dir)?;
            }
        }
        for (tool, tool_dir) in subdirs(&package_dir.join("tools")) {
            for (version, release_dir) in subdirs(&tool_dir) {
                debug!("Found tool {packager}:{tool}@{version}");
                packages
                    .get_or_create_package(&packager)
                    .get_or_create_tool(&tool)
                    .get_or_create_release(&version)
                    .install_dir = Some(release_dir);
            }
        }
    }

    for (packager, package_dir) in subdirs(&user_dir.join("hardware")) {
        for (arch, arch_dir) in subdirs(&package_dir) {
            if !arch_dir.join("boards.txt").is_file() {
                continue;
            }
            let platform_txt = read_properties(&arch_dir.join("platform.txt"))?;
            let version = platform_txt
                .get("version")
                .unwrap_or(UNVERSIONED_PLATFORM)
                .to_string();
            load_platform_release(packages, &packager, &arch, &version, &arch_dir)?;
        }
    }
    Ok(())
}

fn load_platform_release(
    packages: &mut Packages,
    packager: &str,
    arch: &str,
    version: &str,
    dir: &Path,
) -> Result<(), IndexError> {
    let platform = packages
        .get_or_create_package(packager)
        .get_or_create_platform(arch);
    if let Some(previous) = platform.installed() {
        debug!(
            "Replacing installed platform {} with {}",
            previous.id,
            dir.display()
        );
    }

    let release = platform.get_or_create_release(version);
    release.install_dir = Some(dir.to_path_buf());
    release.properties = read_properties(&dir.join("platform.txt"))?;
    load_boards(release, &read_properties(&dir.join("boards.txt"))?);
    if platform.name.is_empty() {
        if let Some(name) = platform.releases.get(version).and_then(|r| r.properties.get("name")) {
            platform.name = name.to_string();
        }
    }
    platform.set_installed(version);
    debug!("Installed platform {packager}:{arch}@{version} at {}", dir.display());
    Ok(())
}

/// Split `boards.txt` into menu titles and per-board subtrees
pub fn load_boards(release: &mut PlatformRelease, boards_txt: &PropertiesMap) {
    release.menus = boards_txt.sub_tree("menu");
    release.boards.clear();
    for board_id in boards_txt.first_level_keys() {
        if board_id == "menu" {
            continue;
        }
        release.add_board(&board_id, boards_txt.sub_tree(&board_id));
    }
}

fn read_properties(path: &Path) -> Result<PropertiesMap, IndexError> {
    if path.is_file() {
        Ok(PropertiesMap::load(path)?)
    } else {
        Ok(PropertiesMap::new())
    }
}

/// Immediate subdirectories, sorted by name; a missing directory is empty
fn subdirs(dir: &Path) -> Vec<(String, PathBuf)> {
    filesystem::list_dirs(dir)
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            Some((name, path))
        })
        .collect()
}
