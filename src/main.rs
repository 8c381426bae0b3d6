#![forbid(unsafe_code)]

//! `probe-session`: flash firmware and capture boot logs through a remote
//! probe server.
//!
//! Loads the TOML configuration, resolves the probe token, and runs one
//! operation. Ctrl-C or SIGTERM abandons the operation, which kills any
//! probe process it started.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use probe_session::banner::BannerExpectation;
use probe_session::process::LogStream;
use probe_session::{AppError, GlobalConfig, ProbeDriver, Result};

/// Env var holding the firmware version expected in the boot banner.
const FW_VERSION_ENV: &str = "FW_VERSION";

/// Env var holding the firmware hash expected in the boot banner.
const FW_HASH_ENV: &str = "FW_HASH";

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "probe-session",
    about = "Flash firmware and capture boot logs through a remote probe",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json). Logs go to stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// List probes known to the server.
    List,

    /// Write a firmware image to the target.
    Flash {
        /// Firmware image path.
        firmware: PathBuf,
    },

    /// Reset the target.
    Reset,

    /// Attach under reset and print the boot log.
    Attach {
        /// Firmware image path.
        firmware: PathBuf,

        /// Log budget in seconds; defaults to `timeouts.attach_seconds`.
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Stop after this many lines (at least 1).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_lines: Option<u64>,
    },

    /// Flash, attach under reset, and check the boot banner.
    ///
    /// Uses `FW_VERSION` and `FW_HASH` for the exact banner when both are set.
    Verify {
        /// Firmware image path.
        firmware: PathBuf,

        /// Log budget in seconds.
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Number of leading log lines that may carry the banner.
        #[arg(long, default_value_t = 1)]
        scan_lines: u64,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    info!(
        host = %config.connection.host_url(),
        chip = %config.connection.chip,
        "configuration loaded"
    );

    let driver = ProbeDriver::new(config);

    tokio::select! {
        result = execute(&driver, args.command) => result,
        () = shutdown_signal() => {
            warn!("shutdown signal received, abandoning probe operation");
            Err(AppError::Process("interrupted by signal".into()))
        }
    }
}

async fn execute(driver: &ProbeDriver, action: Action) -> Result<()> {
    match action {
        Action::List => {
            let probes = driver.list_probes().await?;
            writeln!(std::io::stdout(), "{}", probes.trim_end())?;
            Ok(())
        }
        Action::Flash { firmware } => driver.flash(&firmware).await,
        Action::Reset => driver.reset().await,
        Action::Attach {
            firmware,
            timeout_secs,
            max_lines,
        } => {
            let mut stream =
                driver.attach_with_reset(&firmware, timeout_secs.map(Duration::from_secs))?;
            let result = stream
                .write_lines(&mut std::io::stdout(), max_lines)
                .await
                .map(|_| ());
            stop(&mut stream, driver.timeouts().exit_grace()).await;
            result
        }
        Action::Verify {
            firmware,
            timeout_secs,
            scan_lines,
        } => {
            let expectation = BannerExpectation::from_parts(
                std::env::var(FW_VERSION_ENV).ok().as_deref(),
                std::env::var(FW_HASH_ENV).ok().as_deref(),
            );

            info!(firmware = %firmware.display(), "flashing firmware");
            driver.flash(&firmware).await?;

            let mut stream =
                driver.attach_with_reset(&firmware, Some(Duration::from_secs(timeout_secs)))?;
            let result = find_banner(&mut stream, &expectation, scan_lines).await;
            stop(&mut stream, driver.timeouts().exit_grace()).await;

            if result.is_ok() {
                info!("boot banner verified");
            }
            result
        }
    }
}

/// Require the banner within the first `scan_lines` lines.
async fn find_banner(
    stream: &mut LogStream,
    expectation: &BannerExpectation,
    scan_lines: u64,
) -> Result<()> {
    let mut last_error = None;

    while stream.lines_delivered() < scan_lines.max(1) {
        let Some(line) = stream.next_line().await? else {
            break;
        };
        info!(line = %line, "boot log");
        match expectation.check(&line) {
            Ok(()) => return Ok(()),
            Err(err) => last_error = Some(err),
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::Verify("no output received from probe".into())))
}

/// Kill the session and give the OS a moment to reap it.
async fn stop(stream: &mut LogStream, grace: Duration) {
    stream.kill();
    if let Err(err) = stream.wait(grace).await {
        warn!(%err, "probe process did not exit after kill");
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
