//! Sketch builder
//!
//! The production [`BuildSteps`] implementation. Build outputs are laid out
//! as:
//!
//! ```text
//! <build>/build.options.json
//! <build>/compile_commands.json
//! <build>/sketch/<Name>.ino.cpp     merged and preprocessed sketch
//! <build>/sketch/**.o
//! <build>/libraries/<Library>/**.o
//! <build>/core/**.o, core.a
//! <build>/<Name>.ino.{elf,hex,...}  produced by the platform's recipes
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::defaults::{
    COMPILATION_DATABASE_FILE, CORE_ARCHIVE, CORE_BUILD_DIR, LIBRARIES_BUILD_DIR, SKETCH_BUILD_DIR,
    SOURCE_EXTENSIONS,
};
use crate::core::build_options::{self, BuildOptions};
use crate::core::compilation_db::CompilationDatabase;
use crate::core::export::{self, CMakeExport};
use crate::core::libraries::{IncludeDetector, LibraryIndex, LibraryLocation};
use crate::core::logger::BuildLogger;
use crate::core::pipeline::{Action, BuildSteps};
use crate::core::properties::PropertiesMap;
use crate::core::recipe::{split_command_line, RecipeRunner};
use crate::core::sketch::{self, Sketch};
use crate::core::size;
use crate::error::StageError;
use crate::infra::filesystem;
use crate::infra::process::CommandRunner;

/// Inputs of a build besides the properties and the sketch
#[derive(Debug, Clone, Default)]
pub struct BuilderOptions {
    pub fqbn: String,
    pub build_path: PathBuf,
    /// Hardware roots, recorded in the build options snapshot
    pub hardware_folders: Vec<PathBuf>,
    /// Library folders, each holding one library per sub-directory
    pub library_folders: Vec<(PathBuf, LibraryLocation)>,
    /// `key=value` overrides given on the command line
    pub custom_build_properties: Vec<String>,
    pub only_update_compilation_database: bool,
}

/// Objects produced by one compile batch
struct CompiledBatch {
    objects: Vec<PathBuf>,
    rebuilt: bool,
}

pub struct Builder<'a> {
    props: PropertiesMap,
    sketch: Sketch,
    options: BuilderOptions,
    arch: String,
    recipes: RecipeRunner<'a>,
    libraries: LibraryIndex,
    detector: IncludeDetector,
    compilation_db: CompilationDatabase,
    sketch_objects: Vec<PathBuf>,
    library_objects: Vec<PathBuf>,
    variant_objects: Vec<PathBuf>,
}

impl<'a> Builder<'a> {
    pub fn new(
        props: PropertiesMap,
        sketch: Sketch,
        options: BuilderOptions,
        runner: &'a dyn CommandRunner,
        logger: &'a dyn BuildLogger,
    ) -> Self {
        let arch = props.get_or("build.arch", "").to_lowercase();
        let libraries = LibraryIndex::scan(&options.library_folders);
        let compilation_db =
            CompilationDatabase::load(options.build_path.join(COMPILATION_DATABASE_FILE));
        let recipes = RecipeRunner::new(runner, logger, options.only_update_compilation_database);
        Self {
            props,
            sketch,
            options,
            arch,
            recipes,
            libraries,
            detector: IncludeDetector::default(),
            compilation_db,
            sketch_objects: Vec::new(),
            library_objects: Vec::new(),
            variant_objects: Vec::new(),
        }
    }

    pub fn properties(&self) -> &PropertiesMap {
        &self.props
    }

    pub fn detector(&self) -> &IncludeDetector {
        &self.detector
    }

    pub fn compilation_database(&self) -> &CompilationDatabase {
        &self.compilation_db
    }

    fn logger(&self) -> &'a dyn BuildLogger {
        self.recipes.logger()
    }

    fn only_update_db(&self) -> bool {
        self.options.only_update_compilation_database
    }

    fn sketch_build_path(&self) -> PathBuf {
        self.options.build_path.join(SKETCH_BUILD_DIR)
    }

    fn libraries_build_path(&self) -> PathBuf {
        self.options.build_path.join(LIBRARIES_BUILD_DIR)
    }

    fn core_build_path(&self) -> PathBuf {
        self.options.build_path.join(CORE_BUILD_DIR)
    }

    fn core_path(&self) -> Result<PathBuf, StageError> {
        self.props
            .get_path("build.core.path")
            .ok_or_else(|| StageError::MissingProperty {
                key: "build.core.path".into(),
            })
    }

    fn variant_path(&self) -> Option<PathBuf> {
        self.props
            .get("build.variant.path")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            fqbn: self.options.fqbn.clone(),
            hardware_folders: self.options.hardware_folders.clone(),
            libraries_folders: self
                .options
                .library_folders
                .iter()
                .map(|(p, _)| p.clone())
                .collect(),
            sketch_location: self.sketch.folder.clone(),
            custom_build_properties: self.options.custom_build_properties.clone(),
            platform_file: self
                .props
                .get_path("runtime.platform.path")
                .map(|p| p.join("platform.txt")),
        }
    }

    fn wipe_build_path(&mut self) -> Result<(), StageError> {
        let wiped =
            build_options::wipe_if_changed(&self.options.build_path, &self.build_options())?;
        if wiped {
            self.compilation_db = CompilationDatabase::new(self.compilation_db.path());
            if self.logger().verbose() {
                self.logger().info("Build options changed, rebuilding all");
            }
        }
        Ok(())
    }

    fn detect_includes(&mut self) -> Result<(), StageError> {
        let mut base = vec![self.core_path()?];
        base.extend(self.variant_path());
        let sources = filesystem::list_files(&self.sketch_build_path(), SOURCE_EXTENSIONS, true);

        let mut detector = IncludeDetector::new(base);
        detector.detect(&sources, &self.libraries, &self.arch)?;
        self.detector = detector;
        Ok(())
    }

    fn preprocess_sketch(&self) -> Result<(), StageError> {
        let merged_path = self.sketch_build_path().join(self.sketch.merged_file_name());
        let merged = filesystem::read_file(&merged_path)?;
        filesystem::write_file_if_changed(&merged_path, &sketch::preprocess(&merged))?;
        Ok(())
    }

    fn compile_sketch(&mut self) -> Result<(), StageError> {
        let build_dir = self.sketch_build_path();
        let sources = filesystem::list_files(&build_dir, SOURCE_EXTENSIONS, true);
        let mut includes = self.detector.include_folders().to_vec();
        includes.push(build_dir.clone());

        let batch = self.compile_files(&sources, &build_dir, &build_dir, &includes)?;
        self.sketch_objects = batch.objects;
        Ok(())
    }

    fn remove_unused_compiled_libraries(&self) -> Result<(), StageError> {
        let used: Vec<String> = self
            .detector
            .imported_libraries()
            .iter()
            .map(|l| l.build_dir_name())
            .collect();
        for dir in filesystem::list_dirs(&self.libraries_build_path()) {
            let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !used.contains(&name) {
                debug!("Removing unused compiled library {name}");
                filesystem::remove_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    fn compile_libraries(&mut self) -> Result<(), StageError> {
        let libraries = self.detector.imported_libraries().to_vec();
        let mut objects = Vec::new();
        for library in &libraries {
            if self.logger().verbose() {
                self.logger().info(&format!("Compiling library \"{}\"", library.name));
            }
            let mut includes = self.detector.include_folders().to_vec();
            includes.extend(library.include_dirs());
            let build_dir = self.libraries_build_path().join(library.build_dir_name());
            let root = library.source_dir.clone();
            let sources = library.source_files();
            objects.extend(self.compile_files(&sources, &root, &build_dir, &includes)?.objects);
        }
        self.library_objects = objects;
        Ok(())
    }

    fn compile_core(&mut self) -> Result<(), StageError> {
        let core_path = self.core_path()?;
        let core_build = self.core_build_path();
        let mut includes = vec![core_path.clone()];
        includes.extend(self.variant_path());

        self.variant_objects = match self.variant_path() {
            Some(variant) => {
                let sources = filesystem::list_files(&variant, SOURCE_EXTENSIONS, true);
                self.compile_files(&sources, &variant, &core_build.join("variant"), &includes)?
                    .objects
            }
            None => Vec::new(),
        };

        let sources = filesystem::list_files(&core_path, SOURCE_EXTENSIONS, true);
        let batch = self.compile_files(&sources, &core_path, &core_build, &includes)?;
        if self.only_update_db() {
            return Ok(());
        }

        let archive = core_build.join(CORE_ARCHIVE);
        if !batch.rebuilt && archive.is_file() {
            debug!("Using previously compiled core archive");
            return Ok(());
        }
        filesystem::remove_file(&archive)?;

        let mut props = self.props.clone();
        props.set("archive_file", CORE_ARCHIVE);
        props.set("archive_file_path", path_string(&archive));
        for object in &batch.objects {
            props.set("object_file", path_string(object));
            let output = self.recipes.run_recipe(&props, "recipe.ar.pattern")?;
            self.recipes.log_output(&output);
        }
        Ok(())
    }

    fn link(&self) -> Result<(), StageError> {
        if self.only_update_db() {
            return Ok(());
        }
        let object_files = self
            .sketch_objects
            .iter()
            .chain(&self.library_objects)
            .chain(&self.variant_objects)
            .map(|o| format!("\"{}\"", path_string(o)))
            .collect::<Vec<_>>()
            .join(" ");

        let mut props = self.props.clone();
        props.set("object_files", object_files);
        props.set("archive_file", CORE_ARCHIVE);
        props.set(
            "archive_file_path",
            path_string(&self.core_build_path().join(CORE_ARCHIVE)),
        );
        let output = self.recipes.run_recipe(&props, "recipe.c.combine.pattern")?;
        self.recipes.log_output(&output);
        Ok(())
    }

    fn merge_with_bootloader(&self) -> Result<(), StageError> {
        if self.only_update_db() {
            return Ok(());
        }
        let file = ["bootloader.noblink", "bootloader.file"]
            .iter()
            .filter_map(|key| self.props.get(key))
            .find(|v| !v.is_empty());
        let Some(file) = file else {
            return Ok(());
        };

        let project = self.props.get_or("build.project_name", "");
        let sketch_hex = self.options.build_path.join(format!("{project}.hex"));
        let bootloader = self
            .props
            .get_path("runtime.platform.path")
            .unwrap_or_default()
            .join("bootloaders")
            .join(self.props.expand(file));

        if !sketch_hex.is_file() {
            debug!("No {} to merge with the bootloader", sketch_hex.display());
            return Ok(());
        }
        if !bootloader.is_file() {
            self.logger().warn(&format!(
                "Bootloader file specified but missing: {}",
                bootloader.display()
            ));
            return Ok(());
        }

        let merged = merge_hex(
            &filesystem::read_file(&sketch_hex)?,
            &filesystem::read_file(&bootloader)?,
        );
        let target = self.options.build_path.join(format!("{project}.with_bootloader.hex"));
        filesystem::write_file(&target, &merged)?;
        Ok(())
    }

    fn export_cmake(&self, main_failed: bool) -> Result<(), StageError> {
        if main_failed || !export::can_export(&self.props) {
            return Ok(());
        }
        let core_path = self.core_path()?;
        let variant_path = self.variant_path();
        let sketch_build_path = self.sketch_build_path();
        export::export(
            &CMakeExport {
                build_path: &self.options.build_path,
                core_path: &core_path,
                variant_path: variant_path.as_deref(),
                sketch_build_path: &sketch_build_path,
                libraries: self.detector.imported_libraries(),
            },
            &self.props,
        )?;
        Ok(())
    }

    fn print_size(&self, main_failed: bool) -> Result<(), StageError> {
        if main_failed || self.only_update_db() {
            return Ok(());
        }
        match size::measure(&self.props, &self.recipes)? {
            Some(report) => size::check(&report, &self.props, self.logger()),
            None => Ok(()),
        }
    }

    /// Compile `sources` found under `source_root` into `build_dir`
    ///
    /// Every command goes into the compilation database. Objects newer
    /// than their source and recorded dependencies are reused.
    fn compile_files(
        &mut self,
        sources: &[PathBuf],
        source_root: &Path,
        build_dir: &Path,
        includes: &[PathBuf],
    ) -> Result<CompiledBatch, StageError> {
        let includes = includes
            .iter()
            .map(|dir| format!("\"-I{}\"", path_string(dir)))
            .collect::<Vec<_>>()
            .join(" ");
        let mut props = self.props.clone();
        props.set("includes", includes);

        let mut batch = CompiledBatch {
            objects: Vec::with_capacity(sources.len()),
            rebuilt: false,
        };
        for source in sources {
            let Some(key) = compile_recipe_key(source) else {
                continue;
            };
            let object = object_path(source, source_root, build_dir);
            props.set("source_file", path_string(source));
            props.set("object_file", path_string(&object));

            let pattern = props
                .get(key)
                .ok_or_else(|| StageError::MissingProperty { key: key.into() })?;
            let command_line = props.expand(pattern);
            self.compilation_db
                .add(&self.options.build_path, split_command_line(&command_line), source);
            batch.objects.push(object.clone());

            if self.only_update_db() {
                continue;
            }
            let mut inputs = vec![source.clone()];
            inputs.extend(object_dependencies(&object));
            let inputs: Vec<&Path> = inputs.iter().map(PathBuf::as_path).collect();
            if !filesystem::is_stale(&object, &inputs) {
                if self.logger().verbose() {
                    self.logger()
                        .info(&format!("Using previously compiled file: {}", object.display()));
                }
                continue;
            }

            if let Some(parent) = object.parent() {
                filesystem::create_dir_all(parent)?;
            }
            let output = self.recipes.run_command_line(&command_line)?;
            self.recipes.log_output(&output);
            batch.rebuilt = true;
        }
        Ok(batch)
    }
}

impl BuildSteps for Builder<'_> {
    fn build_path(&self) -> &Path {
        &self.options.build_path
    }

    fn run_hook(
        &mut self,
        prefix: &str,
        suffix: &str,
        skip_if_only_updating_db: bool,
    ) -> Result<(), StageError> {
        self.recipes.run(&self.props, prefix, suffix, skip_if_only_updating_db)
    }

    fn run_action(&mut self, action: Action, main_failed: bool) -> Result<(), StageError> {
        match action {
            Action::WipeBuildPath => self.wipe_build_path(),
            Action::PrepareSketchBuildPath => self
                .sketch
                .prepare_build_path(&self.sketch_build_path())
                .map(|_| ()),
            Action::DetectIncludes => self.detect_includes(),
            Action::WarnAboutArchIncompatibleLibraries => {
                self.detector.warn_about_arch_incompatible(&self.arch, self.logger());
                Ok(())
            }
            Action::PreprocessSketch => self.preprocess_sketch(),
            Action::CompileSketch => self.compile_sketch(),
            Action::RemoveUnusedCompiledLibraries => self.remove_unused_compiled_libraries(),
            Action::CompileLibraries => self.compile_libraries(),
            Action::CompileCore => self.compile_core(),
            Action::Link => self.link(),
            Action::MergeWithBootloader => self.merge_with_bootloader(),
            Action::PrintUsedAndNotUsedLibraries => {
                self.detector.print_used_and_not_used(self.logger(), main_failed);
                Ok(())
            }
            Action::PrintUsedLibraries => {
                self.detector.print_used(self.logger());
                Ok(())
            }
            Action::ExportProjectCMake => self.export_cmake(main_failed),
            Action::PrintSize => self.print_size(main_failed),
        }
    }

    fn save_compilation_database(&mut self) -> Result<(), StageError> {
        self.compilation_db.save()?;
        Ok(())
    }

    fn preprocessed_sketch(&self) -> Result<String, StageError> {
        let path = self.sketch_build_path().join(self.sketch.merged_file_name());
        Ok(filesystem::read_file(&path)?)
    }
}

fn compile_recipe_key(source: &Path) -> Option<&'static str> {
    match source.extension()?.to_str()? {
        "c" => Some("recipe.c.o.pattern"),
        "cpp" => Some("recipe.cpp.o.pattern"),
        "S" => Some("recipe.S.o.pattern"),
        _ => None,
    }
}

/// `<build_dir>/<path relative to source_root>.o`
fn object_path(source: &Path, source_root: &Path, build_dir: &Path) -> PathBuf {
    let relative = source
        .strip_prefix(source_root)
        .ok()
        .map(Path::to_path_buf)
        .or_else(|| source.file_name().map(PathBuf::from))
        .unwrap_or_default();
    let mut name: OsString = build_dir.join(relative).into_os_string();
    name.push(".o");
    PathBuf::from(name)
}

/// Prerequisites listed in the `.d` file the compiler wrote next to `object`
fn object_dependencies(object: &Path) -> Vec<PathBuf> {
    let Ok(content) = std::fs::read_to_string(object.with_extension("d")) else {
        return Vec::new();
    };
    let Some((_, prerequisites)) = content.split_once(": ") else {
        return Vec::new();
    };
    prerequisites
        .replace("\\\n", " ")
        .split_whitespace()
        .filter(|p| !p.ends_with(':'))
        .map(PathBuf::from)
        .collect()
}

/// Concatenate two Intel HEX images, dropping the first one's end record
pub fn merge_hex(sketch: &str, bootloader: &str) -> String {
    let mut merged = String::new();
    for line in sketch.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.eq_ignore_ascii_case(":00000001FF") {
            continue;
        }
        merged.push_str(line);
        merged.push('\n');
    }
    for line in bootloader.lines().map(str::trim).filter(|l| !l.is_empty()) {
        merged.push_str(line);
        merged.push('\n');
    }
    merged
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
