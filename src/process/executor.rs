//! One-shot probe tool invocations.
//!
//! Runs a command to completion under its budget and collects the merged
//! output. Invocations are at-most-once: nothing here retries.

use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};

use crate::command::Command;
use crate::process::{LineEvent, LogStream};
use crate::{AppError, Result};

/// Output of a command that exited successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (always 0).
    pub exit_code: i32,
    /// Merged stdout/stderr, one `\n`-terminated line per output line.
    pub output: String,
}

/// Run `command` to completion under its budget.
///
/// A tool may close its output before it exits; the exit status is then
/// awaited for the rest of the budget. `exit_grace` bounds the wait for a
/// child killed after a timeout.
///
/// # Errors
///
/// - `AppError::CommandFailed` with the exit code and captured output when
///   the tool exits unsuccessfully.
/// - `AppError::Timeout` with the partial output when the command's budget
///   elapses; the child is killed first.
/// - `AppError::Process` when the tool cannot be launched.
pub async fn run(command: &Command, exit_grace: Duration) -> Result<CommandOutput> {
    let span = info_span!("run_command", command = command.name());

    async move {
        let mut stream = LogStream::start(command)?
            .with_exit_grace(exit_grace)
            .awaiting_exit();
        let mut output = String::new();

        while let Some(event) = stream.next_event().await {
            match event {
                LineEvent::Line(line) => {
                    output.push_str(&line);
                    output.push('\n');
                }
                LineEvent::Ended { exit_code } => {
                    info!(exit_code, "command finished");
                    return Ok(CommandOutput { exit_code, output });
                }
                LineEvent::Failed { exit_code, .. } => {
                    warn!(?exit_code, "command failed");
                    return Err(AppError::CommandFailed { exit_code, output });
                }
                LineEvent::TimedOut => {
                    let budget = stream.budget().unwrap_or_default();
                    warn!(budget_secs = budget.as_secs(), "command timed out, killing");
                    stream.kill();
                    if let Err(err) = stream.wait(exit_grace).await {
                        warn!(%err, "timed-out command did not exit after kill");
                    }
                    return Err(AppError::Timeout { budget, output });
                }
            }
        }

        Err(AppError::Process(
            "output stream ended without an exit status".into(),
        ))
    }
    .instrument(span)
    .await
}
