//! Recipes
//!
//! A recipe is a property whose value is a command line template, such as
//! `recipe.c.o.pattern` or `recipe.hooks.prebuild.1.pattern`. Hooks are
//! selected by key prefix and suffix and run in order of their middle
//! segment: numeric segments first in numeric order, then the rest
//! lexically.

use std::cmp::Ordering;

use tracing::debug;

use crate::core::logger::BuildLogger;
use crate::core::properties::PropertiesMap;
use crate::error::{ProcessError, StageError};
use crate::infra::process::{CommandOutput, CommandRunner};

/// Keys that start with `prefix` and end with `suffix`, in run order
///
/// Recipes with a blank value are disabled and not returned.
pub fn find_recipes(props: &PropertiesMap, prefix: &str, suffix: &str) -> Vec<String> {
    let mut found: Vec<(String, String)> = props
        .keys()
        .filter(|k| k.len() > prefix.len() + suffix.len())
        .filter(|k| k.starts_with(prefix) && k.ends_with(suffix))
        .filter(|k| props.get(k).is_some_and(|v| !v.trim().is_empty()))
        .map(|k| {
            let middle = k[prefix.len()..k.len() - suffix.len()].trim_matches('.');
            (middle.to_string(), k.to_string())
        })
        .collect();
    found.sort_by(|(a, _), (b, _)| compare_segments(a, b));
    found.into_iter().map(|(_, key)| key).collect()
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Split a command line into arguments
///
/// Whitespace separates arguments except inside double or single quotes.
/// Quotes are removed; a quoted empty string yields an empty argument.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(current);
    }
    args
}

/// Expands recipes and runs them
pub struct RecipeRunner<'a> {
    runner: &'a dyn CommandRunner,
    logger: &'a dyn BuildLogger,
    only_update_compilation_database: bool,
}

impl<'a> RecipeRunner<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        logger: &'a dyn BuildLogger,
        only_update_compilation_database: bool,
    ) -> Self {
        Self {
            runner,
            logger,
            only_update_compilation_database,
        }
    }

    /// Run every recipe matching `prefix`/`suffix`, stopping at the first failure
    ///
    /// Nothing runs when only the compilation database is being refreshed
    /// and `skip_if_only_updating_db` is set.
    pub fn run(
        &self,
        props: &PropertiesMap,
        prefix: &str,
        suffix: &str,
        skip_if_only_updating_db: bool,
    ) -> Result<(), StageError> {
        if skip_if_only_updating_db && self.only_update_compilation_database {
            debug!("Skipping {prefix}*{suffix} recipes");
            return Ok(());
        }

        for key in find_recipes(props, prefix, suffix) {
            let output = self.run_recipe(props, &key)?;
            self.log_output(&output);
        }
        Ok(())
    }

    /// Expand and run the recipe stored under `key`
    pub fn run_recipe(
        &self,
        props: &PropertiesMap,
        key: &str,
    ) -> Result<CommandOutput, StageError> {
        let pattern = props
            .get(key)
            .ok_or_else(|| StageError::MissingProperty { key: key.to_string() })?;
        self.run_command_line(&props.expand(pattern))
    }

    /// Run an already expanded command line
    pub fn run_command_line(&self, command_line: &str) -> Result<CommandOutput, StageError> {
        let args = split_command_line(command_line);
        if args.is_empty() {
            return Err(ProcessError::EmptyCommand.into());
        }
        if self.logger.verbose() {
            self.logger.info(command_line);
        }

        let output = self.runner.run(&args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(StageError::Command {
                command: command_line.to_string(),
                status: output.status,
                output: output.combined(),
            })
        }
    }

    /// Forward command output (usually compiler warnings) to the logger
    pub fn log_output(&self, output: &CommandOutput) {
        let text = output.combined();
        let text = text.trim_end();
        if !text.is_empty() {
            self.logger.info(text);
        }
    }

    pub fn logger(&self) -> &'a dyn BuildLogger {
        self.logger
    }

    pub fn only_update_compilation_database(&self) -> bool {
        self.only_update_compilation_database
    }
}
