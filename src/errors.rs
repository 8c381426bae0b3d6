//! Error types shared across the application.

use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Child process could not be launched, signalled, or observed.
    Process(String),
    /// The probe tool exited with a nonzero status.
    CommandFailed {
        /// Exit code reported by the OS; `None` when ended by a signal.
        exit_code: Option<i32>,
        /// Merged stdout/stderr captured before the exit.
        output: String,
    },
    /// A wall-clock budget elapsed before the operation finished.
    Timeout {
        /// Budget that was exceeded.
        budget: Duration,
        /// Output captured before the budget elapsed (may be empty).
        output: String,
    },
    /// Boot log did not contain the expected firmware banner.
    Verify(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Exit code carried by a [`AppError::CommandFailed`], if any.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Captured tool output attached to the error, if any.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { output, .. } | Self::Timeout { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Whether the error reports an exceeded time budget.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Process(msg) => write!(f, "process: {msg}"),
            Self::CommandFailed {
                exit_code: Some(code),
                ..
            } => write!(f, "command failed: exit code {code}"),
            Self::CommandFailed {
                exit_code: None, ..
            } => write!(f, "command failed: terminated by signal"),
            Self::Timeout { budget, .. } => {
                write!(f, "timeout: exceeded {:.1}s", budget.as_secs_f64())
            }
            Self::Verify(msg) => write!(f, "verify: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
