//! Test utilities
//!
//! Registry builders and a recording build logger for unit tests, and
//! generators for property-based tests.

#[cfg(test)]
pub mod registry {
    use std::path::PathBuf;

    use crate::core::manager::{PackageManager, PackageManagerEvents};
    use crate::core::package::{Packages, ToolDependency};
    use crate::core::properties::PropertiesMap;

    /// Fluent builder for an in-memory registry
    #[derive(Debug, Default)]
    pub struct RegistryBuilder {
        packages: Packages,
    }

    impl RegistryBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn platform(
            mut self,
            package: &str,
            arch: &str,
            version: &str,
            boards: &[&str],
            installed: bool,
        ) -> Self {
            let platform = self
                .packages
                .get_or_create_package(package)
                .get_or_create_platform(arch);
            let release = platform.get_or_create_release(version);
            for board in boards {
                release.add_board(board, PropertiesMap::from_pairs([("name", *board)]));
            }
            if installed {
                release.install_dir = Some(PathBuf::from(format!(
                    "/hardware/{package}/{arch}/{version}"
                )));
                platform.set_installed(version);
            }
            self
        }

        /// Add a release and mark it installed
        pub fn installed_platform(
            self,
            package: &str,
            arch: &str,
            version: &str,
            boards: &[&str],
        ) -> Self {
            self.platform(package, arch, version, boards, true)
        }

        /// Add a release that is only known from an index
        pub fn available_platform(
            self,
            package: &str,
            arch: &str,
            version: &str,
            boards: &[&str],
        ) -> Self {
            self.platform(package, arch, version, boards, false)
        }

        /// Add a package with no platforms or tools
        pub fn empty_package(mut self, package: &str) -> Self {
            self.packages.get_or_create_package(package);
            self
        }

        /// Add a platform with no releases
        pub fn empty_platform(mut self, package: &str, arch: &str) -> Self {
            self.packages
                .get_or_create_package(package)
                .get_or_create_platform(arch);
            self
        }

        fn target_release(
            &mut self,
            package: &str,
            arch: &str,
        ) -> &mut crate::core::package::PlatformRelease {
            let platform = self
                .packages
                .get_mut(package)
                .and_then(|p| p.platforms.get_mut(arch))
                .expect("platform must be added first");
            let version = platform
                .installed()
                .or_else(|| platform.latest_release())
                .map(|r| r.version().to_string())
                .expect("platform must have a release");
            platform.get_or_create_release(&version)
        }

        /// Set a property on a board of the installed (or latest) release
        pub fn board_property(
            mut self,
            package: &str,
            arch: &str,
            board: &str,
            key: &str,
            value: &str,
        ) -> Self {
            self.target_release(package, arch)
                .boards
                .get_mut(board)
                .expect("board must be added first")
                .properties
                .set(key, value);
            self
        }

        /// Set a `platform.txt` property on the installed (or latest) release
        pub fn platform_property(
            mut self,
            package: &str,
            arch: &str,
            key: &str,
            value: &str,
        ) -> Self {
            self.target_release(package, arch).properties.set(key, value);
            self
        }

        /// Declare an explicit tool dependency
        pub fn tool_dependency(
            mut self,
            package: &str,
            arch: &str,
            packager: &str,
            name: &str,
            version: &str,
        ) -> Self {
            self.target_release(package, arch)
                .tool_dependencies
                .push(ToolDependency {
                    packager: packager.to_string(),
                    name: name.to_string(),
                    version: version.to_string(),
                });
            self
        }

        fn tool(mut self, package: &str, name: &str, version: &str, installed: bool) -> Self {
            let release = self
                .packages
                .get_or_create_package(package)
                .get_or_create_tool(name)
                .get_or_create_release(version);
            if installed {
                release.install_dir =
                    Some(PathBuf::from(format!("/tools/{package}/{name}/{version}")));
            }
            self
        }

        /// Add an installed tool release
        pub fn installed_tool(self, package: &str, name: &str, version: &str) -> Self {
            self.tool(package, name, version, true)
        }

        /// Add a tool release that is not installed
        pub fn available_tool(self, package: &str, name: &str, version: &str) -> Self {
            self.tool(package, name, version, false)
        }

        /// Finish into a package manager
        pub fn build(self) -> PackageManager {
            let mut pm = PackageManager::new();
            *pm.packages_mut() = self.packages;
            pm
        }

        /// Finish into a package manager that reports to `events`
        pub fn build_with_events(self, events: Box<dyn PackageManagerEvents>) -> PackageManager {
            let mut pm = PackageManager::with_events(events);
            *pm.packages_mut() = self.packages;
            pm
        }
    }
}

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a package, architecture or board identifier
    pub fn identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,10}"
    }

    /// Generate a tool version string, semver or arduino-suffixed
    pub fn tool_version() -> impl Strategy<Value = String> {
        prop_oneof![
            (1u32..10, 0u32..10, 0u32..10).prop_map(|(a, b, c)| format!("{a}.{b}.{c}")),
            (1u32..10, 0u32..10, 1u32..9)
                .prop_map(|(a, b, n)| format!("{a}.{b}.0-atmel3.6.1-arduino{n}")),
        ]
    }
}

#[cfg(test)]
pub mod logger {
    use std::sync::Mutex;

    use crate::core::logger::{BuildLogger, LogLevel};

    /// Collects messages in memory
    #[derive(Debug, Default)]
    pub struct MemoryLogger {
        verbose: bool,
        messages: Mutex<Vec<(LogLevel, String)>>,
    }

    impl MemoryLogger {
        pub fn new(verbose: bool) -> Self {
            Self {
                verbose,
                messages: Mutex::new(Vec::new()),
            }
        }

        /// Messages logged so far
        pub fn messages(&self) -> Vec<(LogLevel, String)> {
            self.messages
                .lock()
                .map(|m| m.clone())
                .unwrap_or_default()
        }

        /// Messages of one level, text only
        pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
            self.messages()
                .into_iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m)
                .collect()
        }
    }

    impl BuildLogger for MemoryLogger {
        fn log(&self, level: LogLevel, message: &str) {
            if let Ok(mut messages) = self.messages.lock() {
                messages.push((level, message.to_string()));
            }
        }

        fn verbose(&self) -> bool {
            self.verbose
        }
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use super::registry::RegistryBuilder;
    use proptest::prelude::*;

    #[test]
    fn test_builder_marks_installed_release() {
        let pm = RegistryBuilder::new()
            .installed_platform("arduino", "avr", "1.8.6", &["uno"])
            .available_platform("arduino", "avr", "1.8.7", &[])
            .build();
        let platform = &pm.packages().get("arduino").unwrap().platforms["avr"];
        assert_eq!(platform.installed().unwrap().version(), "1.8.6");
        assert_eq!(platform.releases.len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn test_identifier_generator(id in identifier()) {
            prop_assert!(!id.is_empty());
            prop_assert!(!id.contains(':'));
        }

        #[test]
        fn test_tool_version_generator(version in tool_version()) {
            prop_assert!(crate::core::version::parse_lenient(&version).is_some());
        }
    }
}
