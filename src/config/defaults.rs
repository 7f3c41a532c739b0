//! Default configuration values

/// Upper bound on `{key}` substitution passes when expanding a recipe
pub const MAX_PROPERTY_EXPANSION_PASSES: usize = 10;

/// `build.warn_data_percentage` when the platform does not set one
pub const DEFAULT_WARN_DATA_PERCENTAGE: u64 = 75;

/// Reported as `runtime.ide.version`
pub const RUNTIME_IDE_VERSION: &str = "10607";

/// Compiler warnings level when none is configured
pub const DEFAULT_WARNINGS_LEVEL: &str = "none";

/// Package index read from the data directory
pub const DEFAULT_INDEX_FILE: &str = "package_index.json";

/// Options snapshot stored in the build directory
pub const BUILD_OPTIONS_FILE: &str = "build.options.json";

/// Compilation database stored in the build directory
pub const COMPILATION_DATABASE_FILE: &str = "compile_commands.json";

/// Sub-directory of the build path holding sketch objects
pub const SKETCH_BUILD_DIR: &str = "sketch";

/// Sub-directory of the build path holding library objects
pub const LIBRARIES_BUILD_DIR: &str = "libraries";

/// Sub-directory of the build path holding core objects
pub const CORE_BUILD_DIR: &str = "core";

/// Sub-directory of the build path holding the CMake export
pub const CMAKE_EXPORT_DIR: &str = "_cmake";

/// Core archive name
pub const CORE_ARCHIVE: &str = "core.a";

/// Header implicitly included by the preprocessed sketch
pub const MAIN_HEADER: &str = "Arduino.h";

/// Source extensions compiled from sketches, libraries and cores
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cpp", "S"];

/// Header extensions looked up when resolving includes
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "hh"];

/// Sketch file extensions merged into the main translation unit
pub const SKETCH_EXTENSIONS: &[&str] = &["ino", "pde"];
