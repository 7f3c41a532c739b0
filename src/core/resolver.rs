//! FQBN resolution
//!
//! Maps an [`Fqbn`] onto the installed package graph: package, installed
//! platform release, board, the board's build properties and the platform
//! release that provides the core used for the build. The last one differs
//! from the board's own release when `build.core` is `packager:core`.
//!
//! On failure every entity found before the failing step is handed back in
//! a [`PartialResolution`] so callers can still report what was found.

use std::fmt;

use tracing::debug;

use crate::core::board::Board;
use crate::core::fqbn::Fqbn;
use crate::core::manager::PackageManager;
use crate::core::package::{Package, PlatformRelease};
use crate::core::properties::PropertiesMap;
use crate::error::ResolveError;

/// A fully resolved FQBN
#[derive(Debug, Clone)]
pub struct ResolvedFqbn<'a> {
    pub package: &'a Package,
    pub platform_release: &'a PlatformRelease,
    pub board: &'a Board,
    pub build_properties: PropertiesMap,
    /// Release providing the core; the board's own release unless
    /// `build.core` refers to another package
    pub build_platform_release: &'a PlatformRelease,
}

/// Whatever was resolved before a failure, plus the failure
#[derive(Debug, Clone)]
pub struct PartialResolution<'a> {
    pub package: Option<&'a Package>,
    pub platform_release: Option<&'a PlatformRelease>,
    pub board: Option<&'a Board>,
    pub build_properties: Option<PropertiesMap>,
    pub build_platform_release: Option<&'a PlatformRelease>,
    pub error: ResolveError,
}

impl<'a> PartialResolution<'a> {
    fn new(error: ResolveError) -> Self {
        Self {
            package: None,
            platform_release: None,
            board: None,
            build_properties: None,
            build_platform_release: None,
            error,
        }
    }

    fn with_package(mut self, package: &'a Package) -> Self {
        self.package = Some(package);
        self
    }

    fn with_platform_release(mut self, release: &'a PlatformRelease) -> Self {
        self.platform_release = Some(release);
        self
    }

    fn with_board(mut self, board: &'a Board) -> Self {
        self.board = Some(board);
        self
    }

    fn with_build_properties(mut self, props: PropertiesMap) -> Self {
        self.build_properties = Some(props);
        self
    }

    /// Drop the partial results and keep the error
    pub fn into_error(self) -> ResolveError {
        self.error
    }
}

impl fmt::Display for PartialResolution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for PartialResolution<'_> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl PackageManager {
    /// Resolve an FQBN against the installed platforms
    pub fn resolve_fqbn(&self, fqbn: &Fqbn) -> Result<ResolvedFqbn<'_>, PartialResolution<'_>> {
        let package = self.packages().get(&fqbn.package).ok_or_else(|| {
            PartialResolution::new(ResolveError::UnknownPackage {
                package: fqbn.package.clone(),
            })
        })?;

        let platform = package.platforms.get(&fqbn.platform_arch).ok_or_else(|| {
            PartialResolution::new(ResolveError::UnknownPlatform {
                package: package.name.clone(),
                architecture: fqbn.platform_arch.clone(),
            })
            .with_package(package)
        })?;

        let platform_release = platform.installed().ok_or_else(|| {
            PartialResolution::new(ResolveError::PlatformNotInstalled {
                package: package.name.clone(),
                architecture: platform.architecture.clone(),
            })
            .with_package(package)
        })?;

        let board = platform_release.boards.get(&fqbn.board_id).ok_or_else(|| {
            PartialResolution::new(ResolveError::BoardNotFound {
                platform: platform_release.id.to_string(),
                board_id: fqbn.board_id.clone(),
            })
            .with_package(package)
            .with_platform_release(platform_release)
        })?;

        let build_properties = board.build_properties(&fqbn.configs).map_err(|source| {
            PartialResolution::new(ResolveError::InvalidBuildProperties {
                board: board.to_string(),
                source,
            })
            .with_package(package)
            .with_platform_release(platform_release)
            .with_board(board)
        })?;

        let build_platform_release = match build_properties
            .get("build.core")
            .and_then(|core| core.split_once(':'))
            .map(|(packager, _)| packager.to_string())
        {
            None => platform_release,
            Some(referred) => {
                let found = self
                    .packages()
                    .get(&referred)
                    .and_then(|p| p.platforms.get(&fqbn.platform_arch))
                    .and_then(|p| p.installed());
                match found {
                    Some(release) => {
                        debug!("Board {board} uses core from {}", release.id);
                        release
                    }
                    None => {
                        return Err(PartialResolution::new(ResolveError::MissingCorePackage {
                            package: referred,
                            architecture: fqbn.platform_arch.clone(),
                        })
                        .with_package(package)
                        .with_platform_release(platform_release)
                        .with_board(board)
                        .with_build_properties(build_properties));
                    }
                }
            }
        };

        Ok(ResolvedFqbn {
            package,
            platform_release,
            board,
            build_properties,
            build_platform_release,
        })
    }
}
