//! Compile command implementation
//!
//! Implements `boardsmith compile`: resolve the board and its tools,
//! assemble build properties and run the build pipeline.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};

use super::Environment;
use crate::cli::output::{self, status};
use crate::core::build_properties::{self, BuildTarget};
use crate::core::builder::{Builder, BuilderOptions};
use crate::core::fqbn::Fqbn;
use crate::core::libraries::LibraryLocation;
use crate::core::logger::ConsoleLogger;
use crate::core::package::PlatformRelease;
use crate::core::pipeline::{Pipeline, Progress};
use crate::core::properties::PropertiesMap;
use crate::core::resolver::PartialResolution;
use crate::core::sketch::Sketch;
use crate::infra::process::SystemCommandRunner;

/// Compile options
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub fqbn: String,
    pub sketch: PathBuf,
    pub build_path: Option<PathBuf>,
    /// `key=value` overrides
    pub build_properties: Vec<String>,
    pub only_compilation_database: bool,
    pub preprocess: bool,
    pub verbose: bool,
    pub quiet: bool,
}

/// Execute the compile command
///
/// The pipeline spawns compilers synchronously, so it runs on the blocking
/// thread pool.
pub async fn execute(options: CompileOptions) -> Result<()> {
    tokio::task::spawn_blocking(move || compile(&options))
        .await
        .context("Compile task failed")?
}

fn compile(options: &CompileOptions) -> Result<()> {
    let env = Environment::load()?;
    let fqbn = Fqbn::parse(&options.fqbn)
        .with_context(|| format!("Invalid FQBN '{}'", options.fqbn))?;
    let resolved = env
        .manager
        .resolve_fqbn(&fqbn)
        .map_err(PartialResolution::into_error)
        .with_context(|| format!("Failed to resolve {fqbn}"))?;
    let tools = env
        .manager
        .find_tools_required_for_board(resolved.board)
        .context("Failed to resolve required tools")?;

    let sketch = Sketch::load(&options.sketch)
        .with_context(|| format!("Failed to load sketch {}", options.sketch.display()))?;
    let build_path = options
        .build_path
        .clone()
        .unwrap_or_else(|| default_build_path(&sketch.folder));
    let custom = parse_build_properties(&options.build_properties)?;
    let verbose = options.verbose || env.config.build.verbose.unwrap_or(false);
    let project_name = sketch.project_name();

    let props = build_properties::assemble(&BuildTarget {
        fqbn: &fqbn,
        resolved: &resolved,
        packages: env.manager.packages(),
        tools: &tools,
        build_path: &build_path,
        project_name: &project_name,
        source_path: &sketch.folder,
        jobs: env.config.build_jobs(),
        warnings_level: env.config.warnings_level(),
        custom: &custom,
    });

    let mut library_folders = vec![(env.dirs.user_libraries_dir(), LibraryLocation::User)];
    library_folders.extend(
        libraries_dir(resolved.platform_release).map(|d| (d, LibraryLocation::Platform)),
    );
    if resolved.build_platform_release.id != resolved.platform_release.id {
        library_folders.extend(
            libraries_dir(resolved.build_platform_release)
                .map(|d| (d, LibraryLocation::ReferencedPlatform)),
        );
    }

    let builder_options = BuilderOptions {
        fqbn: fqbn.to_string(),
        build_path: build_path.clone(),
        hardware_folders: vec![env.dirs.packages_dir(), env.dirs.user_hardware_dir()],
        library_folders,
        custom_build_properties: options.build_properties.clone(),
        only_update_compilation_database: options.only_compilation_database,
    };

    tracing::info!("Compiling {} for {fqbn} in {}", sketch.name, build_path.display());
    let sketch_name = sketch.name.clone();
    let logger = ConsoleLogger::new(verbose, options.quiet);
    let runner = SystemCommandRunner::new().with_working_dir(build_path.clone());
    let mut builder = Builder::new(props, sketch, builder_options, &runner, &logger);

    if options.preprocess {
        Pipeline::new(&mut builder, &logger)
            .run_preprocess()
            .with_context(|| format!("Failed to preprocess {sketch_name}"))?;
        return Ok(());
    }

    let bar = (!options.quiet && !verbose).then(|| output::create_build_bar(&sketch_name));
    let progress = match &bar {
        Some(bar) => {
            let bar = bar.clone();
            Progress::new()
                .with_callback(move |percent| bar.set_position(output::bar_position(percent)))
        }
        None => Progress::new(),
    };

    let result = Pipeline::new(&mut builder, &logger).with_progress(progress).run();
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    result.with_context(|| format!("Failed to compile {sketch_name} for {fqbn}"))?;

    if !options.quiet {
        if options.only_compilation_database {
            println!(
                "{} Compilation database written to {}",
                status::SUCCESS,
                build_path.join("compile_commands.json").display()
            );
        } else {
            println!("{} Compiled {sketch_name} for {fqbn}", status::SUCCESS);
        }
    }
    Ok(())
}

fn libraries_dir(release: &PlatformRelease) -> Option<PathBuf> {
    release.install_dir.as_ref().map(|dir| dir.join("libraries"))
}

/// `<tmp>/boardsmith/sketches/<hash of the sketch folder>`
fn default_build_path(sketch_folder: &Path) -> PathBuf {
    let digest = Sha256::digest(sketch_folder.to_string_lossy().as_bytes());
    let hash = hex::encode_upper(&digest[..16]);
    std::env::temp_dir().join("boardsmith").join("sketches").join(hash)
}

fn parse_build_properties(values: &[String]) -> Result<PropertiesMap> {
    let mut props = PropertiesMap::new();
    for value in values {
        let Some((key, val)) = value.split_once('=') else {
            bail!("Invalid build property '{value}': expected KEY=VALUE");
        };
        if key.trim().is_empty() {
            bail!("Invalid build property '{value}': empty key");
        }
        props.set(key.trim(), val);
    }
    Ok(props)
}
