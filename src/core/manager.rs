//! Package manager
//!
//! Owns the package registry and answers lookup queries over it. FQBN
//! resolution lives in [`crate::core::resolver`] and tool selection in
//! [`crate::core::tools`]; both are `&self` methods on [`PackageManager`].

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::core::board::Board;
use crate::core::fqbn::Fqbn;
use crate::core::index::PackageIndex;
use crate::core::package::{
    Package, Packages, PlatformRelease, PlatformReleaseId, Tool, ToolRelease,
};
use crate::error::{IndexError, LookupError, ResolveError};

/// Observer notified by the package manager
///
/// Every method has an empty default so implementors only override what
/// they care about.
pub trait PackageManagerEvents {
    /// A tool release was chosen for a board build
    ///
    /// `explicit` is true when the platform declared the dependency, false
    /// when the release is the latest installed fallback.
    fn tool_release_selected(&self, _release: &ToolRelease, _explicit: bool) {}
}

/// Registry of packages plus the queries run against it
#[derive(Default)]
pub struct PackageManager {
    packages: Packages,
    events: Option<Box<dyn PackageManagerEvents>>,
}

impl fmt::Debug for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageManager")
            .field("packages", &self.packages)
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl PackageManager {
    /// Create a manager with an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager that reports to `events`
    pub fn with_events(events: Box<dyn PackageManagerEvents>) -> Self {
        Self {
            packages: Packages::new(),
            events: Some(events),
        }
    }

    /// Discard all loaded packages
    pub fn clear(&mut self) {
        self.packages.reset();
    }

    /// The registry
    pub fn packages(&self) -> &Packages {
        &self.packages
    }

    /// The registry, for loading
    pub fn packages_mut(&mut self) -> &mut Packages {
        &mut self.packages
    }

    pub(crate) fn events(&self) -> Option<&dyn PackageManagerEvents> {
        self.events.as_deref()
    }

    /// Parse a local package index file and merge it into the registry
    pub fn load_package_index(&mut self, path: &Path) -> Result<(), IndexError> {
        let index = PackageIndex::load(path)?;
        debug!("Merging package index {}", path.display());
        index.merge_into(&mut self.packages);
        Ok(())
    }

    /// Installed platform releases across all packages
    pub fn installed_platform_releases(&self) -> Vec<&PlatformRelease> {
        self.packages
            .iter()
            .flat_map(|p| p.platforms.values())
            .filter_map(|platform| platform.installed())
            .collect()
    }

    /// Installed tool releases across all packages
    pub fn installed_tool_releases(&self) -> Vec<&ToolRelease> {
        self.packages
            .iter()
            .flat_map(|p| p.tools.values())
            .flat_map(|t| t.releases.values())
            .filter(|r| r.is_installed())
            .collect()
    }

    fn installed_boards(&self) -> impl Iterator<Item = &Board> {
        self.installed_platform_releases()
            .into_iter()
            .flat_map(|release| release.boards.values())
    }

    /// Boards of installed releases that advertise the USB id pair
    pub fn find_boards_with_vid_pid(&self, vid: &str, pid: &str) -> Vec<&Board> {
        self.installed_boards()
            .filter(|b| b.has_usb_id(vid, pid))
            .collect()
    }

    /// Boards of installed releases with the given board id
    pub fn find_boards_with_id(&self, id: &str) -> Vec<&Board> {
        self.installed_boards().filter(|b| b.board_id == id).collect()
    }

    /// Parse and resolve an FQBN, returning only the board
    pub fn find_board_with_fqbn(&self, fqbn: &str) -> Result<&Board, ResolveError> {
        let fqbn = Fqbn::parse(fqbn)?;
        match self.resolve_fqbn(&fqbn) {
            Ok(resolved) => Ok(resolved.board),
            Err(partial) => Err(partial.error),
        }
    }

    /// Look up the platform release a board belongs to
    pub fn platform_release(
        &self,
        id: &PlatformReleaseId,
    ) -> Result<&PlatformRelease, LookupError> {
        self.packages
            .get(&id.packager)
            .and_then(|p| p.platforms.get(&id.architecture))
            .and_then(|platform| platform.release(&id.version))
            .ok_or_else(|| LookupError::PlatformReleaseNotFound { id: id.to_string() })
    }

    /// Look up a package
    pub fn find_package(&self, name: &str) -> Result<&Package, LookupError> {
        self.packages
            .get(name)
            .ok_or_else(|| LookupError::PackageNotFound {
                name: name.to_string(),
            })
    }

    /// Look up a tool of a package
    pub fn find_tool(&self, packager: &str, name: &str) -> Result<&Tool, LookupError> {
        let package = self.find_package(packager)?;
        package
            .tools
            .get(name)
            .ok_or_else(|| LookupError::ToolNotFound {
                package: packager.to_string(),
                tool: name.to_string(),
            })
    }

    /// Look up a specific tool release
    pub fn find_tool_release(
        &self,
        packager: &str,
        name: &str,
        version: &str,
    ) -> Result<&ToolRelease, LookupError> {
        let tool = self.find_tool(packager, name)?;
        tool.release(version)
            .ok_or_else(|| LookupError::ReleaseNotFound {
                tool: tool.to_string(),
                version: version.to_string(),
            })
    }

    /// Whether any release of the tool is installed
    pub fn is_tool_installed(&self, packager: &str, name: &str) -> Result<bool, LookupError> {
        Ok(self.find_tool(packager, name)?.is_installed())
    }
}
