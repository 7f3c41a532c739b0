//! Library discovery and include detection
//!
//! Libraries live one per folder in the user's sketchbook and inside
//! platform releases. Include detection scans sources for `#include`
//! directives and imports the library providing each header that is not
//! already reachable, following imported libraries transitively.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::config::defaults::{HEADER_EXTENSIONS, SOURCE_EXTENSIONS};
use crate::core::logger::BuildLogger;
use crate::core::properties::PropertiesMap;
use crate::error::StageError;
use crate::infra::filesystem;

/// Where a library was found, lowest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LibraryLocation {
    /// Bundled with the platform providing the core
    ReferencedPlatform,
    /// Bundled with the board's platform
    Platform,
    /// Installed in the sketchbook
    User,
}

impl fmt::Display for LibraryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReferencedPlatform => "referenced platform",
            Self::Platform => "platform",
            Self::User => "user",
        })
    }
}

/// Source layout of a library folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryLayout {
    /// Sources at the top level plus an optional `utility/` folder
    Flat,
    /// Sources under `src/`, compiled recursively
    Recursive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub name: String,
    pub dir: PathBuf,
    pub source_dir: PathBuf,
    pub layout: LibraryLayout,
    pub location: LibraryLocation,
    pub version: Option<String>,
    /// Empty or containing `*` means any architecture
    pub architectures: Vec<String>,
}

impl Library {
    /// Load the library stored in `dir`
    ///
    /// A `library.properties` with a `src/` folder selects the recursive
    /// layout. Without metadata the folder name is the library name.
    pub fn load(dir: &Path, location: LibraryLocation) -> Self {
        let folder_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata_file = dir.join("library.properties");
        let metadata = if metadata_file.is_file() {
            PropertiesMap::load(&metadata_file)
                .map_err(|e| debug!("Ignoring {}: {e}", metadata_file.display()))
                .ok()
        } else {
            None
        };

        let layout = if metadata.is_some() && dir.join("src").is_dir() {
            LibraryLayout::Recursive
        } else {
            LibraryLayout::Flat
        };
        let source_dir = match layout {
            LibraryLayout::Recursive => dir.join("src"),
            LibraryLayout::Flat => dir.to_path_buf(),
        };

        let metadata = metadata.unwrap_or_default();
        let architectures = metadata
            .get_or("architectures", "*")
            .split(',')
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();

        Self {
            name: metadata.get("name").map_or(folder_name, str::to_string),
            dir: dir.to_path_buf(),
            source_dir,
            layout,
            location,
            version: metadata.get("version").map(str::to_string),
            architectures,
        }
    }

    pub fn supports_architecture(&self, arch: &str) -> bool {
        let arch = arch.to_lowercase();
        self.architectures.is_empty() || self.architectures.iter().any(|a| a == "*" || *a == arch)
    }

    /// Whether `header` sits at the top of the library's source folder
    pub fn has_header(&self, header: &str) -> bool {
        self.source_dir.join(header).is_file()
    }

    /// Sources to compile, sorted
    pub fn source_files(&self) -> Vec<PathBuf> {
        match self.layout {
            LibraryLayout::Recursive => {
                filesystem::list_files(&self.source_dir, SOURCE_EXTENSIONS, true)
            }
            LibraryLayout::Flat => {
                let mut files = filesystem::list_files(&self.dir, SOURCE_EXTENSIONS, false);
                let utility = self.dir.join("utility");
                files.extend(filesystem::list_files(&utility, SOURCE_EXTENSIONS, true));
                files
            }
        }
    }

    /// Folders added to the include path when compiling this library
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.source_dir.clone()];
        let utility = self.dir.join("utility");
        if self.layout == LibraryLayout::Flat && utility.is_dir() {
            dirs.push(utility);
        }
        dirs
    }

    /// Sub-directory of the libraries build folder for this library
    pub fn build_dir_name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// Every library found in a set of library folders
#[derive(Debug, Clone, Default)]
pub struct LibraryIndex {
    libraries: Vec<Library>,
}

impl LibraryIndex {
    /// Scan `folders`, each holding one library per sub-directory
    pub fn scan(folders: &[(PathBuf, LibraryLocation)]) -> Self {
        let mut libraries = Vec::new();
        for (folder, location) in folders {
            let dirs = filesystem::list_dirs(folder);
            libraries.extend(dirs.iter().map(|dir| Library::load(dir, *location)));
        }
        debug!("Found {} libraries", libraries.len());
        Self { libraries }
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Libraries providing `header`, in scan order
    pub fn candidates(&self, header: &str) -> Vec<&Library> {
        self.libraries.iter().filter(|l| l.has_header(header)).collect()
    }
}

/// Pick the best library for `header` among `candidates`
///
/// Prefers, in order: architecture compatibility, a name matching the
/// header, a higher priority location, then scan order.
pub fn select_library<'a>(
    header: &str,
    candidates: &[&'a Library],
    arch: &str,
) -> Option<&'a Library> {
    let stem = Path::new(header)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    candidates
        .iter()
        .enumerate()
        .max_by_key(|(index, lib)| {
            let name_matches =
                lib.name.to_lowercase() == stem || lib.build_dir_name().to_lowercase() == stem;
            (
                lib.supports_architecture(arch),
                name_matches,
                lib.location,
                std::cmp::Reverse(*index),
            )
        })
        .map(|(_, lib)| *lib)
}

/// Headers named by `#include` directives in `source`
pub fn find_includes(source: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*#\s*include\s*[<"]([^>"]+)[>"]"#).expect("include regex is valid")
    });
    re.captures_iter(source).map(|c| c[1].trim().to_string()).collect()
}

/// A header several libraries could satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousInclude {
    pub header: String,
    pub used: PathBuf,
    pub not_used: Vec<PathBuf>,
}

/// Result of include detection
#[derive(Debug, Clone, Default)]
pub struct IncludeDetector {
    include_folders: Vec<PathBuf>,
    imported: Vec<Library>,
    ambiguous: Vec<AmbiguousInclude>,
    unresolved: Vec<String>,
}

impl IncludeDetector {
    /// Start from the include folders that are always available
    pub fn new(base_include_folders: Vec<PathBuf>) -> Self {
        Self {
            include_folders: base_include_folders,
            ..Self::default()
        }
    }

    /// Scan `sources` and every file they pull in
    pub fn detect(
        &mut self,
        sources: &[PathBuf],
        index: &LibraryIndex,
        arch: &str,
    ) -> Result<(), StageError> {
        let mut queue: VecDeque<PathBuf> = sources.iter().cloned().collect();
        let mut scanned: HashSet<PathBuf> = HashSet::new();
        let mut resolved: HashSet<String> = HashSet::new();

        while let Some(file) = queue.pop_front() {
            if !scanned.insert(file.clone()) {
                continue;
            }
            let content = filesystem::read_file(&file)?;
            for header in find_includes(&content) {
                if let Some(path) = self.locate(&file, &header) {
                    queue.push_back(path);
                    continue;
                }
                if !resolved.insert(header.clone()) {
                    continue;
                }

                let candidates = index.candidates(&header);
                let Some(library) = select_library(&header, &candidates, arch) else {
                    debug!("No library provides {header}, leaving it to the toolchain");
                    self.unresolved.push(header);
                    continue;
                };
                if candidates.len() > 1 {
                    self.ambiguous.push(AmbiguousInclude {
                        header: header.clone(),
                        used: library.dir.clone(),
                        not_used: candidates
                            .iter()
                            .filter(|c| c.dir != library.dir)
                            .map(|c| c.dir.clone())
                            .collect(),
                    });
                }

                debug!("Importing library {} for {header}", library.name);
                self.include_folders.push(library.source_dir.clone());
                queue.push_back(library.source_dir.join(&header));
                queue.extend(library.source_files());
                self.imported.push(library.clone());
            }
        }
        Ok(())
    }

    fn locate(&self, including_file: &Path, header: &str) -> Option<PathBuf> {
        let local = including_file.parent().map(|dir| dir.join(header));
        local
            .into_iter()
            .chain(self.include_folders.iter().map(|dir| dir.join(header)))
            .find(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map_or(true, |e| {
                        HEADER_EXTENSIONS.contains(&e) || SOURCE_EXTENSIONS.contains(&e)
                    })
            })
    }

    pub fn imported_libraries(&self) -> &[Library] {
        &self.imported
    }

    pub fn include_folders(&self) -> &[PathBuf] {
        &self.include_folders
    }

    pub fn ambiguous(&self) -> &[AmbiguousInclude] {
        &self.ambiguous
    }

    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Warn about imported libraries that do not declare `arch`
    pub fn warn_about_arch_incompatible(&self, arch: &str, logger: &dyn BuildLogger) {
        for library in self.imported.iter().filter(|l| !l.supports_architecture(arch)) {
            logger.warn(&format!(
                "WARNING: library {} claims to run on {} architecture(s) and may be \
                 incompatible with your current board which runs on {} architecture(s).",
                library.name,
                library.architectures.join(", "),
                arch
            ));
        }
    }

    /// Report headers with several candidate libraries
    ///
    /// Printed as warnings after a failed build, as info when verbose,
    /// and not at all otherwise.
    pub fn print_used_and_not_used(&self, logger: &dyn BuildLogger, main_failed: bool) {
        if !main_failed && !logger.verbose() {
            return;
        }
        for ambiguous in &self.ambiguous {
            let mut message =
                format!("Multiple libraries were found for \"{}\"\n", ambiguous.header);
            message.push_str(&format!("  Used: {}", ambiguous.used.display()));
            for dir in &ambiguous.not_used {
                message.push_str(&format!("\n  Not used: {}", dir.display()));
            }
            if main_failed {
                logger.warn(&message);
            } else {
                logger.info(&message);
            }
        }
    }

    /// List the imported libraries when verbose
    pub fn print_used(&self, logger: &dyn BuildLogger) {
        if !logger.verbose() {
            return;
        }
        for library in &self.imported {
            let message = match &library.version {
                Some(version) => format!(
                    "Using library {} at version {version} in folder: {}",
                    library.name,
                    library.dir.display()
                ),
                None => format!(
                    "Using library {} in folder: {}",
                    library.name,
                    library.dir.display()
                ),
            };
            logger.info(&message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::logger::LogLevel;
    use crate::test_utils::logger::MemoryLogger;
    use tempfile::TempDir;

    fn library(
        root: &Path,
        name: &str,
        properties: Option<&str>,
        files: &[(&str, &str)],
    ) -> PathBuf {
        let dir = root.join(name);
        filesystem::create_dir_all(&dir).unwrap();
        if let Some(props) = properties {
            filesystem::write_file(&dir.join("library.properties"), props).unwrap();
        }
        for (path, content) in files {
            filesystem::write_file(&dir.join(path), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_find_includes() {
        let source = concat!(
            "#include <Servo.h>\n",
            "  #  include \"local.h\"\n",
            "// #include <nope.h> is still matched only at line start\n",
            "int x; #include <no.h>\n",
        );
        assert_eq!(find_includes(source), vec!["Servo.h", "local.h"]);
    }

    #[test]
    fn test_library_layouts() {
        let tmp = TempDir::new().unwrap();
        let recursive = library(
            tmp.path(),
            "Servo",
            Some("name=Servo\nversion=1.2.1\narchitectures=avr, SAM\n"),
            &[("src/Servo.h", ""), ("src/avr/Servo.cpp", ""), ("examples/Sweep/Sweep.ino", "")],
        );
        let flat = library(
            tmp.path(),
            "Wire",
            None,
            &[("Wire.h", ""), ("Wire.cpp", ""), ("utility/twi.c", "")],
        );

        let servo = Library::load(&recursive, LibraryLocation::User);
        assert_eq!(servo.layout, LibraryLayout::Recursive);
        assert_eq!(servo.version.as_deref(), Some("1.2.1"));
        assert!(servo.supports_architecture("AVR"));
        assert!(servo.supports_architecture("sam"));
        assert!(!servo.supports_architecture("esp32"));
        assert_eq!(servo.source_files(), vec![recursive.join("src/avr/Servo.cpp")]);

        let wire = Library::load(&flat, LibraryLocation::Platform);
        assert_eq!(wire.name, "Wire");
        assert_eq!(wire.layout, LibraryLayout::Flat);
        assert!(wire.supports_architecture("anything"));
        assert_eq!(wire.source_files(), vec![flat.join("Wire.cpp"), flat.join("utility/twi.c")]);
        assert_eq!(wire.include_dirs(), vec![flat.clone(), flat.join("utility")]);
    }

    #[test]
    fn test_select_library_preferences() {
        let tmp = TempDir::new().unwrap();
        let user = tmp.path().join("user");
        let platform = tmp.path().join("platform");
        let header = [("src/Display.h", "")];
        library(&user, "MyDisplay", Some("name=MyDisplay\narchitectures=*\n"), &header);
        library(&platform, "Display", Some("name=Display\narchitectures=avr\n"), &header);
        library(&user, "Display_ESP", Some("name=Display\narchitectures=esp32\n"), &header);

        let index = LibraryIndex::scan(&[
            (user.clone(), LibraryLocation::User),
            (platform.clone(), LibraryLocation::Platform),
        ]);
        assert_eq!(index.len(), 3);
        let candidates = index.candidates("Display.h");

        let chosen = select_library("Display.h", &candidates, "avr").unwrap();
        assert_eq!(chosen.dir, platform.join("Display"));

        // incompatible name match loses to a compatible library
        let chosen = select_library("Display.h", &candidates, "samd").unwrap();
        assert_eq!(chosen.dir, user.join("MyDisplay"));

        assert!(select_library("Display.h", &[], "avr").is_none());
    }

    #[test]
    fn test_detect_imports_transitively() {
        let tmp = TempDir::new().unwrap();
        let libs = tmp.path().join("libs");
        library(
            &libs,
            "Sensor",
            Some("name=Sensor\nversion=2.0.0\narchitectures=avr\n"),
            &[
                ("src/Sensor.h", "#include <Wire.h>\n"),
                ("src/Sensor.cpp", "#include \"Sensor.h\"\n"),
            ],
        );
        library(&libs, "Wire", None, &[("Wire.h", "#include <inttypes.h>\n"), ("Wire.cpp", "")]);
        library(&libs, "Unused", None, &[("Unused.h", "")]);

        let core = tmp.path().join("core");
        filesystem::write_file(&core.join("Arduino.h"), "#include <avr/io.h>\n").unwrap();
        let sketch = tmp.path().join("build/sketch/Blink.ino.cpp");
        filesystem::write_file(
            &sketch,
            "#include <Arduino.h>\n#include <Sensor.h>\n#include \"conf.h\"\n",
        )
        .unwrap();
        filesystem::write_file(&sketch.with_file_name("conf.h"), "#define X 1\n").unwrap();

        let index = LibraryIndex::scan(&[(libs.clone(), LibraryLocation::User)]);
        let mut detector = IncludeDetector::new(vec![core.clone()]);
        detector.detect(&[sketch], &index, "avr").unwrap();

        let names: Vec<&str> = detector
            .imported_libraries()
            .iter()
            .map(|l| l.name.as_str())
            .collect();
        assert_eq!(names, vec!["Sensor", "Wire"]);
        assert_eq!(
            detector.include_folders(),
            &[core, libs.join("Sensor/src"), libs.join("Wire")]
        );
        assert!(detector.ambiguous().is_empty());
        assert!(detector.unresolved().contains(&"avr/io.h".to_string()));
        assert!(detector.unresolved().contains(&"inttypes.h".to_string()));
    }

    #[test]
    fn test_reports() {
        let tmp = TempDir::new().unwrap();
        let user = tmp.path().join("user");
        let platform = tmp.path().join("platform");
        library(
            &user,
            "SD",
            Some("name=SD\nversion=1.0\narchitectures=sam\n"),
            &[("src/SD.h", "")],
        );
        library(&platform, "SD", None, &[("SD.h", "")]);
        let sketch = tmp.path().join("main.cpp");
        filesystem::write_file(&sketch, "#include <SD.h>\n").unwrap();

        let index = LibraryIndex::scan(&[
            (user.clone(), LibraryLocation::User),
            (platform.clone(), LibraryLocation::Platform),
        ]);
        let mut detector = IncludeDetector::new(Vec::new());
        detector.detect(&[sketch], &index, "avr").unwrap();
        assert_eq!(detector.imported_libraries()[0].dir, platform.join("SD"));
        assert_eq!(detector.ambiguous().len(), 1);

        let quiet = MemoryLogger::new(false);
        detector.print_used_and_not_used(&quiet, false);
        detector.print_used(&quiet);
        assert!(quiet.messages().is_empty());

        let failed = MemoryLogger::new(false);
        detector.print_used_and_not_used(&failed, true);
        let warnings = failed.messages_at(LogLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Multiple libraries were found for \"SD.h\""));
        assert!(warnings[0].contains(&format!("Not used: {}", user.join("SD").display())));

        let verbose = MemoryLogger::new(true);
        detector.print_used(&verbose);
        assert_eq!(
            verbose.messages_at(LogLevel::Info),
            vec![format!("Using library SD in folder: {}", platform.join("SD").display())]
        );

        let arch = MemoryLogger::new(false);
        let mut incompatible = IncludeDetector::new(Vec::new());
        incompatible.imported.push(Library::load(&user.join("SD"), LibraryLocation::User));
        incompatible.warn_about_arch_incompatible("avr", &arch);
        assert_eq!(arch.messages_at(LogLevel::Warn).len(), 1);
    }
}
