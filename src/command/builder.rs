//! Argument vectors for the probe tool.
//!
//! Every invocation has the shape
//! `<probe_binary> --host <scheme>://<host>:<port> --token <token> <action...>`.

use std::path::Path;

use crate::config::ConnectionConfig;
use crate::{AppError, Result};

/// Probe tool sub-command with its own arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAction<'a> {
    /// `list`: enumerate probes attached to the server.
    List,
    /// `download --chip <chip> <firmware>`.
    Download {
        /// Firmware image to write.
        firmware: &'a Path,
    },
    /// `reset --chip <chip>`.
    Reset,
    /// `attach --chip <chip> <firmware> --connect-under-reset`.
    Attach {
        /// Firmware image whose symbols the session uses.
        firmware: &'a Path,
    },
}

impl ProbeAction<'_> {
    /// Sub-command name as passed to the tool.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Download { .. } => "download",
            Self::Reset => "reset",
            Self::Attach { .. } => "attach",
        }
    }

    fn needs_chip(&self) -> bool {
        !matches!(self, Self::List)
    }
}

/// Build the full argument vector for `action`.
///
/// # Errors
///
/// Returns `AppError::Config` when the token is empty, or when the chip is
/// empty for an action that targets it.
pub fn build_args(connection: &ConnectionConfig, action: ProbeAction<'_>) -> Result<Vec<String>> {
    if connection.token.is_empty() {
        return Err(AppError::Config(format!(
            "probe token is required for `{}`",
            action.name()
        )));
    }

    if action.needs_chip() && connection.chip.is_empty() {
        return Err(AppError::Config(format!(
            "chip is required for `{}`",
            action.name()
        )));
    }

    let mut argv = vec![
        connection.probe_binary.clone(),
        "--host".to_owned(),
        connection.host_url(),
        "--token".to_owned(),
        connection.token.clone(),
        action.name().to_owned(),
    ];

    match action {
        ProbeAction::List => {}
        ProbeAction::Reset => {
            argv.extend(["--chip".to_owned(), connection.chip.clone()]);
        }
        ProbeAction::Download { firmware } => {
            argv.extend([
                "--chip".to_owned(),
                connection.chip.clone(),
                path_arg(firmware),
            ]);
        }
        ProbeAction::Attach { firmware } => {
            argv.extend([
                "--chip".to_owned(),
                connection.chip.clone(),
                path_arg(firmware),
                "--connect-under-reset".to_owned(),
            ]);
        }
    }

    Ok(argv)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
