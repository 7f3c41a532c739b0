//! Build pipeline
//!
//! A build is a list of [`Stage`]s executed by a single dispatch loop.
//! The main sequence is fail-fast. Whatever happens there, the compilation
//! database is saved and the secondary sequence (library reports, export,
//! size) runs afterwards. A main sequence error always wins over a
//! secondary one.

use std::fmt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::core::logger::BuildLogger;
use crate::error::{BuildError, StageError};
use crate::infra::filesystem;

/// Build actions the pipeline can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    WipeBuildPath,
    PrepareSketchBuildPath,
    DetectIncludes,
    WarnAboutArchIncompatibleLibraries,
    PreprocessSketch,
    CompileSketch,
    RemoveUnusedCompiledLibraries,
    CompileLibraries,
    CompileCore,
    Link,
    MergeWithBootloader,
    PrintUsedAndNotUsedLibraries,
    PrintUsedLibraries,
    ExportProjectCMake,
    PrintSize,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WipeBuildPath => "wipe build path",
            Self::PrepareSketchBuildPath => "prepare sketch build path",
            Self::DetectIncludes => "detect includes",
            Self::WarnAboutArchIncompatibleLibraries => "check library architectures",
            Self::PreprocessSketch => "preprocess sketch",
            Self::CompileSketch => "compile sketch",
            Self::RemoveUnusedCompiledLibraries => "remove unused compiled libraries",
            Self::CompileLibraries => "compile libraries",
            Self::CompileCore => "compile core",
            Self::Link => "link",
            Self::MergeWithBootloader => "merge with bootloader",
            Self::PrintUsedAndNotUsedLibraries => "report library selection",
            Self::PrintUsedLibraries => "report used libraries",
            Self::ExportProjectCMake => "export cmake project",
            Self::PrintSize => "size",
        };
        f.write_str(name)
    }
}

/// One entry of a build sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Run every `<prefix>*<suffix>` recipe
    Hook {
        prefix: &'static str,
        suffix: &'static str,
        skip_if_only_updating_compilation_database: bool,
    },
    /// Run a build action
    Action(Action),
    /// Print a banner when verbose
    Log { warn: bool, message: &'static str },
}

impl Stage {
    const fn hook(prefix: &'static str, skip: bool) -> Self {
        Self::Hook {
            prefix,
            suffix: ".pattern",
            skip_if_only_updating_compilation_database: skip,
        }
    }

    const fn info(message: &'static str) -> Self {
        Self::Log {
            warn: false,
            message,
        }
    }

    /// Name used in traces and errors
    pub fn name(&self) -> String {
        match self {
            Self::Hook { prefix, suffix, .. } => format!("{prefix}*{suffix}"),
            Self::Action(action) => action.to_string(),
            Self::Log { .. } => "log".to_string(),
        }
    }
}

/// The fail-fast build sequence
pub fn main_sequence() -> Vec<Stage> {
    vec![
        Stage::Action(Action::WipeBuildPath),
        Stage::hook("recipe.hooks.prebuild", false),
        Stage::Action(Action::PrepareSketchBuildPath),
        Stage::info("Detecting libraries used..."),
        Stage::Action(Action::DetectIncludes),
        Stage::Action(Action::WarnAboutArchIncompatibleLibraries),
        Stage::info("Generating function prototypes..."),
        Stage::Action(Action::PreprocessSketch),
        Stage::info("Compiling sketch..."),
        Stage::hook("recipe.hooks.sketch.prebuild", false),
        Stage::Action(Action::CompileSketch),
        Stage::hook("recipe.hooks.sketch.postbuild", true),
        Stage::info("Compiling libraries..."),
        Stage::hook("recipe.hooks.libraries.prebuild", false),
        Stage::Action(Action::RemoveUnusedCompiledLibraries),
        Stage::Action(Action::CompileLibraries),
        Stage::hook("recipe.hooks.libraries.postbuild", true),
        Stage::info("Compiling core..."),
        Stage::hook("recipe.hooks.core.prebuild", false),
        Stage::Action(Action::CompileCore),
        Stage::hook("recipe.hooks.core.postbuild", true),
        Stage::info("Linking everything together..."),
        Stage::hook("recipe.hooks.linking.prelink", false),
        Stage::Action(Action::Link),
        Stage::hook("recipe.hooks.linking.postlink", true),
        Stage::hook("recipe.hooks.objcopy.preobjcopy", false),
        Stage::hook("recipe.objcopy.", true),
        Stage::hook("recipe.hooks.objcopy.postobjcopy", true),
        Stage::Action(Action::MergeWithBootloader),
        Stage::hook("recipe.hooks.postbuild", true),
    ]
}

/// Reports and exports that run after the main sequence
pub fn secondary_sequence() -> Vec<Stage> {
    vec![
        Stage::Action(Action::PrintUsedAndNotUsedLibraries),
        Stage::Action(Action::PrintUsedLibraries),
        Stage::Action(Action::ExportProjectCMake),
        Stage::Action(Action::PrintSize),
    ]
}

/// Sequence that stops after generating the preprocessed sketch
pub fn preprocess_sequence() -> Vec<Stage> {
    vec![
        Stage::Action(Action::WipeBuildPath),
        Stage::hook("recipe.hooks.prebuild", false),
        Stage::Action(Action::PrepareSketchBuildPath),
        Stage::Action(Action::DetectIncludes),
        Stage::Action(Action::WarnAboutArchIncompatibleLibraries),
        Stage::Action(Action::PreprocessSketch),
    ]
}

/// The build actions behind the pipeline
pub trait BuildSteps {
    /// Build output directory
    fn build_path(&self) -> &Path;

    /// Run the recipes selected by `prefix` and `suffix`
    fn run_hook(
        &mut self,
        prefix: &str,
        suffix: &str,
        skip_if_only_updating_db: bool,
    ) -> Result<(), StageError>;

    /// Run one action; `main_failed` is set for secondary actions after a failed main sequence
    fn run_action(&mut self, action: Action, main_failed: bool) -> Result<(), StageError>;

    /// Persist the compilation database
    fn save_compilation_database(&mut self) -> Result<(), StageError>;

    /// The preprocessed main translation unit
    fn preprocessed_sketch(&self) -> Result<String, StageError>;
}

type ProgressCallback = Box<dyn FnMut(f32)>;

/// Nested step accounting for progress reporting
///
/// Every level of [`add_sub_steps`](Progress::add_sub_steps) splits the
/// current step into equal parts; [`remove_sub_steps`](Progress::remove_sub_steps)
/// returns to the enclosing level.
#[derive(Default)]
pub struct Progress {
    progress: f32,
    step_amount: f32,
    parents: Vec<(f32, f32)>,
    callback: Option<ProgressCallback>,
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("progress", &self.progress)
            .field("step_amount", &self.step_amount)
            .field("depth", &self.parents.len())
            .finish()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every pushed percentage to `callback`
    #[must_use]
    pub fn with_callback(mut self, callback: impl FnMut(f32) + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Split the current step into `steps` sub-steps
    pub fn add_sub_steps(&mut self, steps: usize) {
        self.parents.push((self.progress, self.step_amount));
        if self.step_amount == 0.0 {
            self.step_amount = 100.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let steps = steps.max(1) as f32;
        self.step_amount /= steps;
    }

    /// Return to the enclosing level
    pub fn remove_sub_steps(&mut self) {
        if let Some((progress, step_amount)) = self.parents.pop() {
            self.progress = progress;
            self.step_amount = step_amount;
        }
    }

    /// Mark the current step as done
    pub fn complete_step(&mut self) {
        self.progress += self.step_amount;
    }

    /// Run `f` inside a level of `steps` sub-steps
    pub fn with_sub_steps<T>(&mut self, steps: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        self.add_sub_steps(steps);
        let result = f(self);
        self.remove_sub_steps();
        result
    }

    /// Current completion, 0 to 100
    pub fn percent(&self) -> f32 {
        self.progress.clamp(0.0, 100.0)
    }

    /// Send the current percentage to the callback
    pub fn push_progress(&mut self) {
        let percent = self.percent();
        if let Some(callback) = self.callback.as_mut() {
            callback(percent);
        }
    }
}

/// Drives [`BuildSteps`] through the build sequences
pub struct Pipeline<'a> {
    steps: &'a mut dyn BuildSteps,
    logger: &'a dyn BuildLogger,
    progress: Progress,
}

impl<'a> Pipeline<'a> {
    pub fn new(steps: &'a mut dyn BuildSteps, logger: &'a dyn BuildLogger) -> Self {
        Self {
            steps,
            logger,
            progress: Progress::new(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Full build: main sequence, compilation database, secondary sequence
    pub fn run(&mut self) -> Result<(), BuildError> {
        filesystem::create_dir_all(self.steps.build_path())?;
        let Self {
            steps,
            logger,
            progress,
        } = self;

        progress.with_sub_steps(2, |progress| {
            let main_result = progress.with_sub_steps(main_sequence().len(), |progress| {
                run_stages(&mut **steps, *logger, progress, &main_sequence(), false)
            });
            progress.complete_step();
            progress.push_progress();

            if let Err(e) = steps.save_compilation_database() {
                warn!("Could not save compilation database: {e}");
            }

            let main_failed = main_result.is_err();
            let secondary_result = progress.with_sub_steps(secondary_sequence().len(), |progress| {
                run_stages(&mut **steps, *logger, progress, &secondary_sequence(), main_failed)
            });
            progress.complete_step();
            progress.push_progress();

            main_result.and(secondary_result)
        })
    }

    /// Reduced build that prints the preprocessed sketch
    pub fn run_preprocess(&mut self) -> Result<(), BuildError> {
        filesystem::create_dir_all(self.steps.build_path())?;
        let Self {
            steps,
            logger,
            progress,
        } = self;

        let stages = preprocess_sequence();
        progress.with_sub_steps(stages.len(), |progress| {
            run_stages(&mut **steps, *logger, progress, &stages, false)
        })?;

        let source = steps
            .preprocessed_sketch()
            .map_err(|source| BuildError::StageFailed {
                stage: "read preprocessed sketch".to_string(),
                source,
            })?;
        logger.write_stdout(&source);
        Ok(())
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }
}

fn run_stages(
    steps: &mut dyn BuildSteps,
    logger: &dyn BuildLogger,
    progress: &mut Progress,
    stages: &[Stage],
    main_failed: bool,
) -> Result<(), BuildError> {
    for stage in stages {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        debug!("Ts: {ts} - Running: {}", stage.name());

        let result = match stage {
            Stage::Hook {
                prefix,
                suffix,
                skip_if_only_updating_compilation_database,
            } => steps.run_hook(prefix, suffix, *skip_if_only_updating_compilation_database),
            Stage::Action(action) => steps.run_action(*action, main_failed),
            Stage::Log { warn, message } => {
                if logger.verbose() {
                    if *warn {
                        logger.warn(message);
                    } else {
                        logger.info(message);
                    }
                }
                Ok(())
            }
        };
        result.map_err(|source| BuildError::StageFailed {
            stage: stage.name(),
            source,
        })?;

        progress.complete_step();
        progress.push_progress();
    }
    Ok(())
}
