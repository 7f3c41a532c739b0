//! CLI command implementations
//!
//! Each command is implemented in its own submodule. Commands share the
//! [`Environment`]: directories, global configuration and the registry
//! loaded from package indexes and installed hardware.

pub mod board;
pub mod compile;
pub mod platform;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::debug;

use crate::core::global_config::GlobalConfig;
use crate::core::manager::{PackageManager, PackageManagerEvents};
use crate::core::package::ToolRelease;
use crate::infra::dirs::BoardsmithDirs;
use crate::infra::hardware;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect installed boards
    Board {
        #[command(subcommand)]
        command: BoardCommands,
    },

    /// Inspect installed platforms
    Core {
        #[command(subcommand)]
        command: CoreCommands,
    },

    /// Compile a sketch
    Compile {
        /// Fully qualified board name, e.g. arduino:avr:uno
        #[arg(short = 'b', long)]
        fqbn: String,

        /// Sketch folder or main sketch file
        sketch: PathBuf,

        /// Directory for build outputs
        #[arg(long)]
        build_path: Option<PathBuf>,

        /// Override a build property (repeatable)
        #[arg(long = "build-property", value_name = "KEY=VALUE")]
        build_properties: Vec<String>,

        /// Only refresh compile_commands.json, without running the compiler
        #[arg(long)]
        only_compilation_database: bool,

        /// Print the preprocessed sketch instead of compiling
        #[arg(long)]
        preprocess: bool,
    },
}

/// Board subcommands
#[derive(Subcommand, Debug)]
pub enum BoardCommands {
    /// List installed boards
    List {
        /// USB vendor id
        #[arg(long, requires = "pid")]
        vid: Option<String>,

        /// USB product id
        #[arg(long, requires = "vid")]
        pid: Option<String>,

        /// Board id, e.g. uno
        #[arg(long, conflicts_with = "vid")]
        id: Option<String>,
    },

    /// Show how a board resolves
    Details {
        /// Fully qualified board name
        fqbn: String,

        /// Dump the board's build properties
        #[arg(long)]
        properties: bool,
    },
}

/// Core (platform) subcommands
#[derive(Subcommand, Debug)]
pub enum CoreCommands {
    /// List installed platforms
    List,
}

impl Commands {
    /// Run the command
    pub async fn run(self, verbose: bool, quiet: bool) -> Result<()> {
        match self {
            Self::Board { command } => match command {
                BoardCommands::List { vid, pid, id } => board::execute_list(vid, pid, id).await,
                BoardCommands::Details { fqbn, properties } => {
                    board::execute_details(&fqbn, properties).await
                }
            },
            Self::Core { command } => match command {
                CoreCommands::List => platform::execute_list().await,
            },
            Self::Compile {
                fqbn,
                sketch,
                build_path,
                build_properties,
                only_compilation_database,
                preprocess,
            } => {
                let options = compile::CompileOptions {
                    fqbn,
                    sketch,
                    build_path,
                    build_properties,
                    only_compilation_database,
                    preprocess,
                    verbose,
                    quiet,
                };
                compile::execute(options).await
            }
        }
    }
}

/// Traces every tool release picked for a board
struct TraceToolSelection;

impl PackageManagerEvents for TraceToolSelection {
    fn tool_release_selected(&self, release: &ToolRelease, explicit: bool) {
        let reason = if explicit { "required by platform" } else { "latest installed" };
        debug!("Selected tool {release} ({reason})");
    }
}

/// Directories, configuration and the loaded registry
#[derive(Debug)]
pub struct Environment {
    pub dirs: BoardsmithDirs,
    pub config: GlobalConfig,
    pub manager: PackageManager,
}

impl Environment {
    /// Load configuration, package indexes and installed hardware
    pub fn load() -> Result<Self> {
        let dirs = BoardsmithDirs::new();
        let config = GlobalConfig::load(&dirs).context("Failed to load global configuration")?;
        let dirs = dirs.with_overrides(
            config.directories.data.clone(),
            config.directories.user.clone(),
        );

        let mut manager = PackageManager::with_events(Box::new(TraceToolSelection));
        for index in config.index_files(&dirs) {
            if index.is_file() {
                manager
                    .load_package_index(&index)
                    .with_context(|| format!("Failed to load package index {}", index.display()))?;
            } else {
                debug!("No package index at {}", index.display());
            }
        }
        hardware::load_installed(manager.packages_mut(), &dirs.data_dir(), &dirs.user_dir())
            .context("Failed to load installed hardware")?;

        Ok(Self { dirs, config, manager })
    }
}
