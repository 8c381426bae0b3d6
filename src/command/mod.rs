//! Probe tool invocations as plain values.
//!
//! A [`Command`] is built per invocation by [`builder`], handed to the
//! executor or the log stream, and discarded afterwards.

pub mod builder;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use builder::{build_args, ProbeAction};

/// One probe tool invocation: argument vector, working directory, budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
    label: Option<String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Command {
    /// Create a command from a full argument vector (`argv[0]` is the program).
    #[must_use]
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            label: None,
            working_dir: None,
            timeout: None,
        }
    }

    /// Set a short name used in logs instead of the arguments, which may
    /// carry credentials.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the directory the child starts in.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set or clear the wall-clock budget.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program to execute, if the argument vector is non-empty.
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Log name: the label if set, otherwise the program.
    #[must_use]
    pub fn name(&self) -> &str {
        self.label
            .as_deref()
            .or_else(|| self.program())
            .unwrap_or_default()
    }

    /// Arguments after the program.
    #[must_use]
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// Full argument vector including the program.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Working directory, if set.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Wall-clock budget, if set.
    #[must_use]
    pub fn budget(&self) -> Option<Duration> {
        self.timeout
    }
}
