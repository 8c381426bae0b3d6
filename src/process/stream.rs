//! Time-bounded, pull-based stream of log lines from one child process.
//!
//! A [`LogStream`] owns the [`ProcessHandle`] it launched for its whole life.
//! Each call to [`LogStream::next_event`] waits for the next merged output
//! line, the end of output, or the stream deadline (`created_at + budget`),
//! whichever comes first. The deadline is enforced while waiting, so a child
//! that prints nothing at all is still reported as timed out on time.
//!
//! The sequence ends after the first terminal event ([`LineEvent::Ended`],
//! [`LineEvent::Failed`], [`LineEvent::TimedOut`]) and cannot be restarted.

use std::fmt::{Debug, Formatter};
use std::io::Write;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::command::Command;
use crate::process::{LineSource, ProcessHandle, ProcessState, SignalOutcome};
use crate::{AppError, Result};

/// Default wait for an exit status once the output pipe has closed.
pub const DEFAULT_EXIT_GRACE: Duration = Duration::from_secs(1);

/// Outcome of one pull from a [`LogStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// One complete line of merged output, without its line terminator.
    Line(String),
    /// Output closed and the process exited with status 0.
    Ended {
        /// Always 0.
        exit_code: i32,
    },
    /// Output closed and the process exited unsuccessfully.
    Failed {
        /// Exit code; `None` if ended by a signal or no status was collected.
        exit_code: Option<i32>,
        /// Diagnostic output; lines were already delivered, so usually empty.
        output: String,
    },
    /// The stream budget elapsed. The process may still be running.
    TimedOut,
}

impl LineEvent {
    /// Whether this event ends the sequence.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Line(_))
    }
}

/// Lazy sequence of output lines from one launched process.
pub struct LogStream {
    handle: ProcessHandle,
    lines: LineSource,
    created_at: Instant,
    budget: Option<Duration>,
    exit_grace: Duration,
    await_exit: bool,
    delivered: u64,
    exhausted: bool,
}

impl Debug for LogStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("handle", &self.handle)
            .field("created_at", &self.created_at)
            .field("budget", &self.budget)
            .field("await_exit", &self.await_exit)
            .field("delivered", &self.delivered)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl LogStream {
    /// Launch `command` and return immediately with a stream over its output.
    ///
    /// The command's timeout becomes the stream budget, measured from now.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Process` if the process cannot be launched.
    pub fn start(command: &Command) -> Result<Self> {
        let mut handle = ProcessHandle::new();
        let lines = handle.launch(command)?;

        Ok(Self {
            handle,
            lines,
            created_at: Instant::now(),
            budget: command.budget(),
            exit_grace: DEFAULT_EXIT_GRACE,
            await_exit: false,
            delivered: 0,
            exhausted: false,
        })
    }

    /// Override how long to wait for the exit status after output closes.
    #[must_use]
    pub fn with_exit_grace(mut self, grace: Duration) -> Self {
        self.exit_grace = grace;
        self
    }

    /// After output closes, wait for the exit status until the budget runs
    /// out instead of only for the exit grace.
    ///
    /// Suits one-shot commands that may close their output well before they
    /// exit. With no budget the wait is unbounded.
    #[must_use]
    pub fn awaiting_exit(mut self) -> Self {
        self.await_exit = true;
        self
    }

    /// Pull the next event; `None` once the sequence is exhausted.
    pub async fn next_event(&mut self) -> Option<LineEvent> {
        if self.exhausted {
            return None;
        }

        if self.budget_exceeded() {
            return Some(self.finish(LineEvent::TimedOut));
        }

        let next = match self.deadline() {
            Some(deadline) => {
                let pulled = tokio::time::timeout_at(deadline, self.lines.next()).await;
                match pulled {
                    Ok(next) => next,
                    Err(_elapsed) => return Some(self.finish(LineEvent::TimedOut)),
                }
            }
            None => self.lines.next().await,
        };

        match next {
            Some(Ok(line)) => {
                self.delivered += 1;
                trace!(pid = self.pid().unwrap_or(0), line = %line, "log line");
                Some(LineEvent::Line(line))
            }
            Some(Err(err)) => {
                warn!(
                    pid = self.pid().unwrap_or(0),
                    %err,
                    "failed to read probe output, treating as end of output"
                );
                Some(self.finish_after_eof().await)
            }
            None => Some(self.finish_after_eof().await),
        }
    }

    /// Pull the next line, mapping terminal failures to errors.
    ///
    /// Returns `Ok(None)` after a clean exit or once exhausted.
    ///
    /// # Errors
    ///
    /// - `AppError::CommandFailed` when the process exited unsuccessfully.
    /// - `AppError::Timeout` when the stream budget elapsed.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        match self.next_event().await {
            Some(LineEvent::Line(line)) => Ok(Some(line)),
            Some(LineEvent::Ended { .. }) | None => Ok(None),
            Some(LineEvent::Failed { exit_code, output }) => {
                Err(AppError::CommandFailed { exit_code, output })
            }
            Some(LineEvent::TimedOut) => Err(AppError::Timeout {
                budget: self.budget.unwrap_or_default(),
                output: String::new(),
            }),
        }
    }

    /// Write each log line to `out` until the session ends, the budget
    /// elapses, or `max_lines` lines were written. Returns the number of
    /// lines written.
    ///
    /// # Errors
    ///
    /// - `AppError::CommandFailed` when the process exited unsuccessfully.
    /// - `AppError::Io` when writing to `out` fails.
    pub async fn write_lines<W: Write>(
        &mut self,
        out: &mut W,
        max_lines: Option<u64>,
    ) -> Result<u64> {
        let mut written = 0;

        while max_lines.is_none_or(|max| written < max) {
            let Some(event) = self.next_event().await else {
                break;
            };
            match event {
                LineEvent::Line(line) => {
                    writeln!(out, "{line}")?;
                    written += 1;
                }
                LineEvent::Ended { .. } => break,
                LineEvent::Failed { exit_code, output } => {
                    return Err(AppError::CommandFailed { exit_code, output });
                }
                LineEvent::TimedOut => {
                    info!(lines = written, "log budget elapsed, ending session");
                    break;
                }
            }
        }

        out.flush()?;
        Ok(written)
    }

    /// Request a graceful stop of the process.
    pub fn terminate(&mut self) -> SignalOutcome {
        self.handle.terminate()
    }

    /// Request a forceful stop of the process.
    pub fn kill(&mut self) -> SignalOutcome {
        self.handle.kill()
    }

    /// Wait up to `timeout` for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Timeout` if it is still running after `timeout`.
    pub async fn wait(&mut self, timeout: Duration) -> Result<Option<i32>> {
        self.handle.wait(timeout).await
    }

    /// OS process id of the supervised child.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.handle.pid()
    }

    /// Lifecycle state of the supervised child.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.handle.state()
    }

    /// Underlying process handle.
    #[must_use]
    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// Budget measured from stream creation, if any.
    #[must_use]
    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Time since the stream was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Number of lines delivered so far.
    #[must_use]
    pub fn lines_delivered(&self) -> u64 {
        self.delivered
    }

    /// Whether a terminal event has been delivered.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn deadline(&self) -> Option<Instant> {
        self.budget.map(|budget| self.created_at + budget)
    }

    fn budget_exceeded(&self) -> bool {
        self.budget
            .is_some_and(|budget| self.created_at.elapsed() > budget)
    }

    async fn finish_after_eof(&mut self) -> LineEvent {
        let status = if self.await_exit {
            match self.deadline() {
                Some(deadline) => {
                    let waited =
                        tokio::time::timeout_at(deadline, self.handle.wait_for_exit()).await;
                    match waited {
                        Ok(status) => status,
                        Err(_elapsed) => return self.finish(LineEvent::TimedOut),
                    }
                }
                None => self.handle.wait_for_exit().await,
            }
        } else {
            self.handle.wait(self.exit_grace).await
        };

        let event = match status {
            Ok(Some(0)) => LineEvent::Ended { exit_code: 0 },
            Ok(exit_code) => LineEvent::Failed {
                exit_code,
                output: String::new(),
            },
            Err(err) => {
                warn!(
                    pid = self.pid().unwrap_or(0),
                    %err,
                    "no exit status after output closed"
                );
                LineEvent::Failed {
                    exit_code: None,
                    output: String::new(),
                }
            }
        };
        self.finish(event)
    }

    fn finish(&mut self, event: LineEvent) -> LineEvent {
        self.exhausted = true;
        let elapsed_ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &event {
            LineEvent::TimedOut => info!(
                pid = self.pid().unwrap_or(0),
                lines = self.delivered,
                elapsed_ms,
                "log stream timed out"
            ),
            LineEvent::Failed { exit_code, .. } => info!(
                pid = self.pid().unwrap_or(0),
                lines = self.delivered,
                ?exit_code,
                elapsed_ms,
                "probe process failed"
            ),
            LineEvent::Ended { .. } | LineEvent::Line(_) => debug!(
                pid = self.pid().unwrap_or(0),
                lines = self.delivered,
                elapsed_ms,
                "log stream ended"
            ),
        }
        event
    }
}
