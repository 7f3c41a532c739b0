//! Build output
//!
//! User-facing build messages go through a [`BuildLogger`]. The console
//! logger mirrors them to `tracing` and the terminal.

/// Severity of a build message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

/// Sink for user-facing build messages
pub trait BuildLogger {
    /// Emit a message
    fn log(&self, level: LogLevel, message: &str);

    /// Whether verbose output was requested
    fn verbose(&self) -> bool;

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Emit text verbatim, without added line breaks
    fn write_stdout(&self, text: &str) {
        self.info(text);
    }
}

/// Writes info to stdout and warnings to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogger {
    verbose: bool,
    quiet: bool,
}

impl ConsoleLogger {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }
}

impl BuildLogger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => {
                tracing::debug!("{message}");
                if !self.quiet {
                    println!("{message}");
                }
            }
            LogLevel::Warn => {
                tracing::debug!("warning: {message}");
                eprintln!("{message}");
            }
        }
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn write_stdout(&self, text: &str) {
        print!("{text}");
    }
}
