//! Probe driver: the operations consumers run against a target.
//!
//! [`ProbeDriver`] owns the immutable configuration and composes the command
//! builder, the one-shot executor, and the log stream into `list_probes`,
//! `flash`, `reset`, and `attach_with_reset`.
//!
//! Only one attach session should be live per driver at a time. The driver
//! does not enforce this; callers serialize sessions.

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::command::{build_args, Command, ProbeAction};
use crate::config::{ConnectionConfig, GlobalConfig, TimeoutConfig};
use crate::process::{self, LogStream};
use crate::Result;

/// Driver for one probe/target pair.
#[derive(Debug)]
pub struct ProbeDriver {
    config: GlobalConfig,
}

impl ProbeDriver {
    /// Create a driver that owns `config`.
    ///
    /// The probe token must already be present; see
    /// [`GlobalConfig::load_credentials`].
    #[must_use]
    pub fn new(config: GlobalConfig) -> Self {
        Self { config }
    }

    /// Connection parameters in use.
    #[must_use]
    pub fn connection(&self) -> &ConnectionConfig {
        &self.config.connection
    }

    /// Time budgets in use.
    #[must_use]
    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.config.timeouts
    }

    /// Build the command for `action` with the given budget.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the token or a required chip is missing.
    pub fn command(&self, action: ProbeAction<'_>, timeout: Option<Duration>) -> Result<Command> {
        let argv = build_args(&self.config.connection, action)?;
        let mut command = Command::new(argv).label(action.name()).timeout(timeout);
        if let Some(dir) = &self.config.working_dir {
            command = command.working_dir(dir);
        }
        Ok(command)
    }

    /// List the probes known to the server and return the tool's output.
    ///
    /// # Errors
    ///
    /// `AppError::CommandFailed` on a nonzero exit, `AppError::Timeout` when
    /// the command budget elapses.
    pub async fn list_probes(&self) -> Result<String> {
        let command = self.command(ProbeAction::List, Some(self.timeouts().command()))?;
        let result = process::run(&command, self.timeouts().exit_grace()).await?;
        Ok(result.output)
    }

    /// Write `firmware` to the target chip.
    ///
    /// Must finish before an attach session against the same image is
    /// meaningful; that ordering is up to the caller.
    ///
    /// # Errors
    ///
    /// `AppError::CommandFailed` on a nonzero exit, `AppError::Timeout` when
    /// the flash budget elapses. Both carry the captured output.
    pub async fn flash(&self, firmware: impl AsRef<Path>) -> Result<()> {
        let firmware = firmware.as_ref();
        let command = self.command(
            ProbeAction::Download { firmware },
            Some(self.timeouts().flash()),
        )?;
        let result = process::run(&command, self.timeouts().exit_grace()).await?;

        info!(
            firmware = %firmware.display(),
            chip = %self.connection().chip,
            output = result.output.trim_end(),
            "firmware flashed"
        );
        Ok(())
    }

    /// Reset the target chip.
    ///
    /// # Errors
    ///
    /// `AppError::CommandFailed` on a nonzero exit, `AppError::Timeout` when
    /// the command budget elapses.
    pub async fn reset(&self) -> Result<()> {
        let command = self.command(ProbeAction::Reset, Some(self.timeouts().command()))?;
        process::run(&command, self.timeouts().exit_grace()).await?;
        info!(chip = %self.connection().chip, "target reset");
        Ok(())
    }

    /// Attach to the target under reset and return its log stream without
    /// reading from it.
    ///
    /// `timeout` of `None` uses the configured attach budget. The caller owns
    /// the stream; dropping it kills the session.
    ///
    /// # Errors
    ///
    /// `AppError::Config` if the command cannot be built, `AppError::Process`
    /// if the tool cannot be launched.
    pub fn attach_with_reset(
        &self,
        firmware: impl AsRef<Path>,
        timeout: Option<Duration>,
    ) -> Result<LogStream> {
        let firmware = firmware.as_ref();
        let budget = timeout.or_else(|| self.timeouts().attach());
        let command = self.command(ProbeAction::Attach { firmware }, budget)?;
        let stream = LogStream::start(&command)?.with_exit_grace(self.timeouts().exit_grace());

        info!(
            firmware = %firmware.display(),
            chip = %self.connection().chip,
            pid = stream.pid().unwrap_or(0),
            budget_secs = budget.map(|b| b.as_secs()),
            "attach session started"
        );
        Ok(stream)
    }
}
