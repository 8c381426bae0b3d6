//! Child process supervision for probe tool invocations.
//!
//! [`ProcessHandle`] owns exactly one launched child and tracks its lifecycle.
//! Stop requests are only ever sent to a child that has not yet been reaped:
//! an unreaped child keeps its pid reserved, so a stale or reused pid can
//! never be signalled. Signals go to the child's process group, so helpers it
//! spawned are stopped too, even when the child itself already exited.
//! Dropping a handle whose child has not been reaped kills the group.

pub mod codec;
pub mod executor;
pub mod merged;
pub mod stream;

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::{AppError, Result};

pub use executor::{run, CommandOutput};
pub use merged::LineSource;
pub use stream::{LineEvent, LogStream};

/// Lifecycle state of a supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No process launched yet.
    NotStarted,
    /// Process launched and not yet observed to exit.
    Running,
    /// Process exited with status 0.
    ExitedClean,
    /// Process exited with a nonzero status or was ended by a signal.
    ExitedError,
    /// Graceful stop requested.
    Terminated,
    /// Forceful stop requested.
    Killed,
}

impl ProcessState {
    /// Every state except `NotStarted` and `Running` is final.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::NotStarted | Self::Running)
    }
}

/// Result of a [`ProcessHandle::terminate`] or [`ProcessHandle::kill`] call.
///
/// None of these is an error; they exist so callers and tests can tell what
/// happened without the controls ever failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The stop signal was sent.
    Delivered,
    /// An equal or stronger stop was already requested; nothing was sent.
    AlreadyRequested,
    /// No process has been launched.
    NotStarted,
    /// The process had already exited; nothing was sent.
    ProcessAlreadyExited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopSignal {
    Terminate,
    Kill,
}

/// Owner of one launched child process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Option<Child>,
    pid: Option<u32>,
    state: ProcessState,
    exit_code: Option<i32>,
    reaped: bool,
}

impl Default for ProcessHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessHandle {
    /// Create a handle in [`ProcessState::NotStarted`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            child: None,
            pid: None,
            state: ProcessState::NotStarted,
            exit_code: None,
            reaped: false,
        }
    }

    /// Launch `command` and return its merged output.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Process` if this handle already launched a process
    /// or the spawn fails.
    pub fn launch(&mut self, command: &Command) -> Result<LineSource> {
        if self.state != ProcessState::NotStarted {
            return Err(AppError::Process(
                "handle already owns a launched process".into(),
            ));
        }

        let (child, output) = merged::spawn_merged(command)?;
        self.pid = child.id();
        self.child = Some(child);
        self.state = ProcessState::Running;

        info!(
            pid = self.pid.unwrap_or(0),
            command = command.name(),
            program = command.program().unwrap_or_default(),
            "probe process started"
        );

        Ok(output)
    }

    /// OS process id, kept after exit for diagnostics.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Exit code once the process has been observed to exit.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Whether the exit status has been collected.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.reaped
    }

    /// Request a graceful stop (SIGTERM to the process group on unix).
    ///
    /// Only acts on a [`ProcessState::Running`] child.
    pub fn terminate(&mut self) -> SignalOutcome {
        match self.state {
            ProcessState::NotStarted => SignalOutcome::NotStarted,
            ProcessState::ExitedClean | ProcessState::ExitedError => {
                SignalOutcome::ProcessAlreadyExited
            }
            ProcessState::Terminated | ProcessState::Killed => SignalOutcome::AlreadyRequested,
            ProcessState::Running => self.stop(StopSignal::Terminate),
        }
    }

    /// Request a forceful stop (SIGKILL to the process group on unix).
    ///
    /// Acts on a running child and escalates a pending graceful stop.
    pub fn kill(&mut self) -> SignalOutcome {
        match self.state {
            ProcessState::NotStarted => SignalOutcome::NotStarted,
            ProcessState::ExitedClean | ProcessState::ExitedError => {
                SignalOutcome::ProcessAlreadyExited
            }
            ProcessState::Killed => SignalOutcome::AlreadyRequested,
            ProcessState::Running | ProcessState::Terminated => self.stop(StopSignal::Kill),
        }
    }

    /// Wait up to `timeout` for the process to exit and return its exit code
    /// (`None` when it was ended by a signal).
    ///
    /// # Errors
    ///
    /// - `AppError::Timeout` if the process is still running after `timeout`.
    /// - `AppError::Process` if nothing was launched or the wait fails.
    pub async fn wait(&mut self, timeout: Duration) -> Result<Option<i32>> {
        let result = tokio::time::timeout(timeout, self.wait_for_exit()).await;
        match result {
            Ok(status) => status,
            Err(_elapsed) => Err(AppError::Timeout {
                budget: timeout,
                output: String::new(),
            }),
        }
    }

    /// Wait without a bound for the process to exit.
    pub(crate) async fn wait_for_exit(&mut self) -> Result<Option<i32>> {
        if self.reaped {
            return Ok(self.exit_code);
        }

        let Some(child) = self.child.as_mut() else {
            return Err(AppError::Process("process has not been started".into()));
        };

        match child.wait().await {
            Ok(status) => {
                self.record_exit(status);
                Ok(self.exit_code)
            }
            Err(err) => Err(AppError::Process(format!(
                "failed to wait for process: {err}"
            ))),
        }
    }

    fn stop(&mut self, signal: StopSignal) -> SignalOutcome {
        if self.reaped {
            return SignalOutcome::ProcessAlreadyExited;
        }

        // Signal before polling: an unreaped leader keeps its group id
        // reserved even after it exited, and helpers it left behind are
        // still in that group.
        let previous = self.state;
        if let Err(err) = self.send(signal) {
            warn!(
                pid = self.pid.unwrap_or(0),
                ?signal,
                %err,
                "failed to signal probe process"
            );
            self.reap_if_exited();
            return SignalOutcome::ProcessAlreadyExited;
        }

        self.state = match signal {
            StopSignal::Terminate => ProcessState::Terminated,
            StopSignal::Kill => ProcessState::Killed,
        };

        // An exit code means the leader ended on its own, not by our signal.
        if self.reap_if_exited() && self.exit_code.is_some() {
            self.state = match previous {
                ProcessState::Running if self.exit_code == Some(0) => ProcessState::ExitedClean,
                ProcessState::Running => ProcessState::ExitedError,
                other => other,
            };
            info!(
                pid = self.pid.unwrap_or(0),
                ?signal,
                exit_code = ?self.exit_code,
                "probe process had already exited, signalled its remaining group"
            );
            return SignalOutcome::ProcessAlreadyExited;
        }

        info!(
            pid = self.pid.unwrap_or(0),
            ?signal,
            "stop signal sent to probe process"
        );
        SignalOutcome::Delivered
    }

    /// Poll the child without blocking; collects the status if it exited.
    fn reap_if_exited(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status);
                true
            }
            Ok(None) => false,
            Err(err) => {
                // No longer our child to wait on; never signal it again.
                warn!(
                    pid = self.pid.unwrap_or(0),
                    %err,
                    "failed to poll probe process status"
                );
                self.reaped = true;
                if self.state == ProcessState::Running {
                    self.state = ProcessState::ExitedError;
                }
                true
            }
        }
    }

    fn record_exit(&mut self, status: ExitStatus) {
        self.reaped = true;
        self.exit_code = status.code();
        if self.state == ProcessState::Running {
            self.state = if status.success() {
                ProcessState::ExitedClean
            } else {
                ProcessState::ExitedError
            };
        }
        debug!(
            pid = self.pid.unwrap_or(0),
            exit_code = ?self.exit_code,
            state = ?self.state,
            "probe process exited"
        );
    }

    #[cfg(unix)]
    fn send(&self, signal: StopSignal) -> std::io::Result<()> {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let pid = self
            .pid
            .ok_or_else(|| std::io::Error::other("process id unavailable"))?;
        let pgid = i32::try_from(pid).map_err(std::io::Error::other)?;
        let sig = match signal {
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        };
        killpg(Pid::from_raw(pgid), sig).map_err(std::io::Error::from)
    }

    #[cfg(not(unix))]
    fn send(&mut self, _signal: StopSignal) -> std::io::Result<()> {
        match self.child.as_mut() {
            Some(child) => child.start_kill(),
            None => Ok(()),
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.child.is_none() || self.reaped || self.state == ProcessState::Killed {
            return;
        }
        if let Err(err) = self.send(StopSignal::Kill) {
            debug!(pid = self.pid.unwrap_or(0), %err, "kill on drop failed");
        } else {
            debug!(pid = self.pid.unwrap_or(0), "killed probe process on drop");
        }
    }
}
