//! Error types for boardsmith
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::package::ToolDependency;

/// FQBN parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FqbnError {
    /// Not enough `:`-separated fields
    #[error("invalid fqbn '{fqbn}': expected package:arch:board[:options]")]
    MissingFields { fqbn: String },

    /// Too many `:`-separated fields
    #[error("invalid fqbn '{fqbn}': too many fields")]
    TooManyFields { fqbn: String },

    /// One of the identifier fields is empty
    #[error("invalid fqbn '{fqbn}': empty {field}")]
    EmptyField { fqbn: String, field: &'static str },

    /// A configuration entry is not in `key=value` form
    #[error("invalid fqbn config '{config}': expected key=value")]
    InvalidConfig { config: String },
}

/// Errors while loading a properties file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertiesError {
    /// A non-comment line without `=`
    #[error("invalid line {line} in '{origin}': '{content}'")]
    InvalidLine {
        origin: String,
        line: usize,
        content: String,
    },

    /// File could not be read
    #[error("reading '{path}': {error}")]
    Read { path: PathBuf, error: String },
}

/// Board configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Menu option value not declared by the board
    #[error("invalid value '{value}' for option '{option}'")]
    InvalidOption { option: String, value: String },

    /// Menu option not declared by the board
    #[error("invalid option '{option}'")]
    UnknownOption { option: String },
}

/// FQBN resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The FQBN string itself is malformed
    #[error("parsing fqbn: {0}")]
    InvalidFqbn(#[from] FqbnError),

    /// Package not present in the registry
    #[error("unknown package {package}")]
    UnknownPackage { package: String },

    /// Architecture not present in the package
    #[error("unknown platform {package}:{architecture}")]
    UnknownPlatform {
        package: String,
        architecture: String,
    },

    /// Platform present but no release installed
    #[error("platform {package}:{architecture} is not installed")]
    PlatformNotInstalled {
        package: String,
        architecture: String,
    },

    /// Board id not defined by the installed release
    #[error("board {platform}:{board_id} not found")]
    BoardNotFound { platform: String, board_id: String },

    /// Configuration overrides rejected by the board
    #[error("getting build properties for board {board}: {source}")]
    InvalidBuildProperties {
        board: String,
        #[source]
        source: BoardError,
    },

    /// `build.core` refers to a package (or release) that is not installed
    #[error("missing package {package}:{architecture} required for build")]
    MissingCorePackage {
        package: String,
        architecture: String,
    },
}

/// Explicit registry lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Package not found
    #[error("package '{name}' not found")]
    PackageNotFound { name: String },

    /// Tool not found in package
    #[error("tool '{tool}' not found in package '{package}'")]
    ToolNotFound { package: String, tool: String },

    /// Release not found for tool
    #[error("release {version} not found for tool {tool}")]
    ReleaseNotFound { tool: String, version: String },

    /// Platform release referenced by a board is gone
    #[error("platform release {id} not found")]
    PlatformReleaseNotFound { id: String },
}

/// Tool dependency resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// An explicit dependency has no installed release
    #[error("tool release not found: {0}")]
    ToolReleaseNotFound(ToolDependency),

    /// The board's platform release could not be looked up
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Package index errors
#[derive(Error, Debug)]
pub enum IndexError {
    /// Failed to read the index file
    #[error("loading json index file {path}: {error}")]
    Read { path: PathBuf, error: String },

    /// Failed to parse the index file
    #[error("parsing json index file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Properties file inside the hardware folder is invalid
    #[error(transparent)]
    Properties(#[from] PropertiesError),
}

/// Filesystem errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to remove file
    #[error("Failed to remove file '{path}': {error}")]
    RemoveFile { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to copy file
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}

/// External process errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// Empty command line after expansion
    #[error("empty command line")]
    EmptyCommand,

    /// Program could not be started
    #[error("failed to run '{program}': {error}")]
    Spawn { program: String, error: String },
}

/// Failure of a single pipeline stage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// External command exited unsuccessfully
    #[error("command '{command}' failed (exit status {status:?})\n{output}")]
    Command {
        command: String,
        status: Option<i32>,
        output: String,
    },

    /// External command could not be started
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Filesystem operation failed
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// A property required by the stage is missing
    #[error("missing build property '{key}'")]
    MissingProperty { key: String },

    /// Sketch layout is invalid
    #[error("invalid sketch: {message}")]
    Sketch { message: String },

    /// Binary does not fit the board
    #[error("{section} section exceeds available space in board ({size} > {max} bytes)")]
    SizeExceeded { section: String, size: u64, max: u64 },

    /// Anything else reported by a build step
    #[error("{0}")]
    Other(String),
}

/// Pipeline errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A stage failed; carries the stage name and the original cause
    #[error("{stage}: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: StageError,
    },

    /// The build directory could not be prepared
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

impl BuildError {
    /// The underlying stage error, if this is a stage failure
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            Self::StageFailed { source, .. } => Some(source),
            Self::Filesystem(_) => None,
        }
    }
}

/// Global configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },
}
