//! Package index files
//!
//! A package index is the JSON document vendors publish to describe their
//! packages, platform releases and tool releases. Only local files are
//! read here. Merging an index never marks anything installed; that is
//! decided by scanning the hardware folders.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::package::{Packages, ToolDependency};
use crate::error::IndexError;

/// Root of a package index file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageIndex {
    #[serde(default)]
    pub packages: Vec<IndexPackage>,
}

/// A package entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexPackage {
    pub name: String,
    #[serde(default)]
    pub maintainer: String,
    #[serde(default, rename = "websiteURL")]
    pub website_url: String,
    #[serde(default)]
    pub platforms: Vec<IndexPlatformRelease>,
    #[serde(default)]
    pub tools: Vec<IndexToolRelease>,
}

/// A platform release entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexPlatformRelease {
    #[serde(default)]
    pub name: String,
    pub architecture: String,
    pub version: String,
    #[serde(default)]
    pub boards: Vec<IndexBoard>,
    #[serde(default, rename = "toolsDependencies")]
    pub tools_dependencies: Vec<ToolDependency>,
}

/// A board advertised by a platform release
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexBoard {
    pub name: String,
}

/// A tool release entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexToolRelease {
    pub name: String,
    pub version: String,
}

impl PackageIndex {
    /// Parse an index from JSON text
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Read and parse an index file
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let content = std::fs::read_to_string(path).map_err(|e| IndexError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|source| IndexError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Add every package, platform release and tool release to `packages`
    pub fn merge_into(&self, packages: &mut Packages) {
        for index_package in &self.packages {
            let package = packages.get_or_create_package(&index_package.name);
            if !index_package.maintainer.is_empty() {
                package.maintainer.clone_from(&index_package.maintainer);
            }
            if !index_package.website_url.is_empty() {
                package.website_url.clone_from(&index_package.website_url);
            }

            for entry in &index_package.platforms {
                let platform = package.get_or_create_platform(&entry.architecture);
                if !entry.name.is_empty() {
                    platform.name.clone_from(&entry.name);
                }
                let release = platform.get_or_create_release(&entry.version);
                release.tool_dependencies.clone_from(&entry.tools_dependencies);
                release.indexed_boards = entry.boards.iter().map(|b| b.name.clone()).collect();
            }

            for entry in &index_package.tools {
                package
                    .get_or_create_tool(&entry.name)
                    .get_or_create_release(&entry.version);
            }
        }
    }
}
