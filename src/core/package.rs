//! Package registry data model
//!
//! Packages own platforms and tools; platforms own releases; releases own
//! boards. Boards and tool releases refer back to their owners through
//! plain identifiers ([`PlatformReleaseId`], [`ToolId`]) that are looked up
//! in the registry when needed.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::board::Board;
use crate::core::properties::PropertiesMap;
use crate::core::version::ReleaseVersion;

/// All loaded packages, keyed by name
#[derive(Debug, Clone, Default)]
pub struct Packages {
    packages: BTreeMap<String, Package>,
}

impl Packages {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard every loaded package
    pub fn reset(&mut self) {
        self.packages.clear();
    }

    /// Look up a package
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    /// Look up a package for mutation
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Package> {
        self.packages.get_mut(name)
    }

    /// Get a package, creating an empty one if missing
    pub fn get_or_create_package(&mut self, name: &str) -> &mut Package {
        self.packages
            .entry(name.to_string())
            .or_insert_with(|| Package::new(name))
    }

    /// Iterate packages in name order
    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether no package is loaded
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// A vendor of platforms and tools
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Package name (the first FQBN field)
    pub name: String,
    /// Maintainer, from the package index
    pub maintainer: String,
    /// Website, from the package index
    pub website_url: String,
    /// Platforms keyed by architecture
    pub platforms: BTreeMap<String, Platform>,
    /// Tools keyed by name
    pub tools: BTreeMap<String, Tool>,
}

impl Package {
    /// Create an empty package
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Get a platform, creating an empty one if missing
    pub fn get_or_create_platform(&mut self, architecture: &str) -> &mut Platform {
        let package = self.name.clone();
        self.platforms
            .entry(architecture.to_string())
            .or_insert_with(|| Platform::new(&package, architecture))
    }

    /// Get a tool, creating an empty one if missing
    pub fn get_or_create_tool(&mut self, name: &str) -> &mut Tool {
        let package = self.name.clone();
        self.tools
            .entry(name.to_string())
            .or_insert_with(|| Tool::new(&package, name))
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One architecture within a package
#[derive(Debug, Clone, Default)]
pub struct Platform {
    /// Owning package name
    pub package: String,
    /// Architecture (the second FQBN field)
    pub architecture: String,
    /// Human readable name
    pub name: String,
    /// Releases keyed by version string
    pub releases: BTreeMap<String, PlatformRelease>,
    installed: Option<String>,
}

impl Platform {
    /// Create an empty platform
    pub fn new(package: &str, architecture: &str) -> Self {
        Self {
            package: package.to_string(),
            architecture: architecture.to_string(),
            ..Self::default()
        }
    }

    /// The installed release, if any
    pub fn installed(&self) -> Option<&PlatformRelease> {
        self.installed
            .as_deref()
            .and_then(|version| self.releases.get(version))
    }

    /// The installed release, for mutation
    pub fn installed_mut(&mut self) -> Option<&mut PlatformRelease> {
        let version = self.installed.clone()?;
        self.releases.get_mut(&version)
    }

    /// Mark `version` as the installed release, replacing any previous one
    ///
    /// Returns `false` if no such release is known.
    pub fn set_installed(&mut self, version: &str) -> bool {
        if self.releases.contains_key(version) {
            self.installed = Some(version.to_string());
            true
        } else {
            false
        }
    }

    /// Forget the installed release
    pub fn clear_installed(&mut self) {
        self.installed = None;
    }

    /// Look up a release
    pub fn release(&self, version: &str) -> Option<&PlatformRelease> {
        self.releases.get(version)
    }

    /// Get a release, creating an empty one if missing
    pub fn get_or_create_release(&mut self, version: &str) -> &mut PlatformRelease {
        let id = PlatformReleaseId {
            packager: self.package.clone(),
            architecture: self.architecture.clone(),
            version: version.to_string(),
        };
        self.releases
            .entry(version.to_string())
            .or_insert_with(|| PlatformRelease::new(id))
    }

    /// Latest release by version ordering, installed or not
    pub fn latest_release(&self) -> Option<&PlatformRelease> {
        self.releases
            .values()
            .max_by_key(|r| ReleaseVersion::new(r.id.version.as_str()))
    }
}

/// Identifies a platform release inside the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformReleaseId {
    /// Package name
    pub packager: String,
    /// Architecture
    pub architecture: String,
    /// Version string
    pub version: String,
}

impl fmt::Display for PlatformReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.packager, self.architecture, self.version)
    }
}

/// A specific version of a platform
#[derive(Debug, Clone)]
pub struct PlatformRelease {
    /// Identity of this release
    pub id: PlatformReleaseId,
    /// `platform.txt` properties
    pub properties: PropertiesMap,
    /// Boards keyed by board id
    pub boards: BTreeMap<String, Board>,
    /// Menu titles from `boards.txt` (`menu.<id>=<title>`)
    pub menus: PropertiesMap,
    /// Tools this release was published against
    pub tool_dependencies: Vec<ToolDependency>,
    /// Board names advertised by the package index
    pub indexed_boards: Vec<String>,
    /// Installation directory; `None` until installed
    pub install_dir: Option<PathBuf>,
}

impl PlatformRelease {
    /// Create an empty release
    pub fn new(id: PlatformReleaseId) -> Self {
        Self {
            id,
            properties: PropertiesMap::new(),
            boards: BTreeMap::new(),
            menus: PropertiesMap::new(),
            tool_dependencies: Vec::new(),
            indexed_boards: Vec::new(),
            install_dir: None,
        }
    }

    /// Version string
    pub fn version(&self) -> &str {
        &self.id.version
    }

    /// Human readable name from `platform.txt`, falling back to the id
    pub fn name(&self) -> String {
        self.properties
            .get("name")
            .map_or_else(|| self.id.to_string(), str::to_string)
    }

    /// Add or replace a board, wiring its back-reference to this release
    pub fn add_board(&mut self, board_id: &str, properties: PropertiesMap) -> &mut Board {
        let board = Board::new(board_id, properties, self.id.clone());
        match self.boards.entry(board_id.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(board);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(board),
        }
    }
}

impl fmt::Display for PlatformRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Identifies a tool inside the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolId {
    /// Package name
    pub packager: String,
    /// Tool name
    pub name: String,
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.packager, self.name)
    }
}

/// An external program and its releases
#[derive(Debug, Clone)]
pub struct Tool {
    /// Identity of this tool
    pub id: ToolId,
    /// Releases keyed by version string
    pub releases: BTreeMap<String, ToolRelease>,
}

impl Tool {
    /// Create a tool with no releases
    pub fn new(packager: &str, name: &str) -> Self {
        Self {
            id: ToolId {
                packager: packager.to_string(),
                name: name.to_string(),
            },
            releases: BTreeMap::new(),
        }
    }

    /// Look up a release
    pub fn release(&self, version: &str) -> Option<&ToolRelease> {
        self.releases.get(version)
    }

    /// Get a release, creating one if missing
    pub fn get_or_create_release(&mut self, version: &str) -> &mut ToolRelease {
        let id = self.id.clone();
        self.releases
            .entry(version.to_string())
            .or_insert_with(|| ToolRelease::new(id, version))
    }

    /// Whether any release is installed
    pub fn is_installed(&self) -> bool {
        self.releases.values().any(ToolRelease::is_installed)
    }

    /// The installed release with the greatest version
    pub fn latest_installed(&self) -> Option<&ToolRelease> {
        self.releases
            .values()
            .filter(|r| r.is_installed())
            .max_by_key(|r| ReleaseVersion::new(r.version.as_str()))
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// A specific version of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRelease {
    /// Owning tool
    pub tool: ToolId,
    /// Version string
    pub version: String,
    /// Installation directory; `None` when not installed
    pub install_dir: Option<PathBuf>,
}

impl ToolRelease {
    /// Create a release that is not installed
    pub fn new(tool: ToolId, version: &str) -> Self {
        Self {
            tool,
            version: version.to_string(),
            install_dir: None,
        }
    }

    /// Whether the release is installed
    pub fn is_installed(&self) -> bool {
        self.install_dir.is_some()
    }
}

impl fmt::Display for ToolRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.tool, self.version)
    }
}

/// A tool required by a platform release
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolDependency {
    /// Package that provides the tool
    pub packager: String,
    /// Tool name
    pub name: String,
    /// Exact version
    pub version: String,
}

impl fmt::Display for ToolDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.packager, self.name, self.version)
    }
}
