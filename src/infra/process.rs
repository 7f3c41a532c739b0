//! External process execution
//!
//! Recipes end up as argument vectors run through a [`CommandRunner`].
//! The system runner spawns real processes; tests substitute their own.

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::error::ProcessError;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !out.is_empty() && !self.stderr.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }
}

/// Runs an argument vector and captures its output
pub trait CommandRunner {
    /// Run `args[0]` with the remaining arguments
    fn run(&self, args: &[String]) -> Result<CommandOutput, ProcessError>;
}

/// Spawns real processes
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    working_dir: Option<PathBuf>,
}

impl SystemCommandRunner {
    /// Create a runner using the current directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands from `dir`
    #[must_use]
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, args: &[String]) -> Result<CommandOutput, ProcessError> {
        let (program, rest) = args.split_first().ok_or(ProcessError::EmptyCommand)?;
        debug!("Running {}", args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(rest);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| ProcessError::Spawn {
            program: program.clone(),
            error: e.to_string(),
        })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_is_rejected() {
        let err = SystemCommandRunner::new().run(&[]).unwrap_err();
        assert_eq!(err, ProcessError::EmptyCommand);
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let err = SystemCommandRunner::new()
            .run(&["boardsmith-no-such-program-xyz".to_string()])
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_output_and_status() {
        let runner = SystemCommandRunner::new();
        let ok = runner
            .run(&["sh".into(), "-c".into(), "echo out; echo err >&2".into()])
            .unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout, "out\n");
        assert_eq!(ok.combined(), "out\nerr\n");

        let failed = runner.run(&["sh".into(), "-c".into(), "exit 3".into()]).unwrap();
        assert_eq!(failed.status, Some(3));
        assert!(!failed.success());
    }
}
