//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service under which the probe token may be stored.
pub const KEYRING_SERVICE: &str = "probe-session";

/// Keychain entry name for the probe token.
pub const TOKEN_KEYRING_KEY: &str = "probe_token";

/// Environment variable consulted when the keychain has no token.
pub const TOKEN_ENV_VAR: &str = "PROBE_RS_TOKEN";

/// Websocket scheme used to reach the remote probe server.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Plain websocket.
    #[default]
    Ws,
    /// TLS websocket.
    Wss,
}

impl Scheme {
    /// URL scheme string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters for the remote probe server and the target chip.
///
/// The token is not required in the TOML file; see
/// [`GlobalConfig::load_credentials`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ConnectionConfig {
    /// Address of the probe server.
    pub host: String,
    /// TCP port of the probe server.
    pub port: u16,
    /// `ws` or `wss`.
    #[serde(default)]
    pub scheme: Scheme,
    /// Target chip identifier passed as `--chip`.
    pub chip: String,
    /// Probe tool executable.
    #[serde(default = "default_probe_binary")]
    pub probe_binary: String,
    /// Authentication token passed as `--token`.
    #[serde(default)]
    pub token: String,
}

impl ConnectionConfig {
    /// Value of the `--host` argument, e.g. `ws://10.0.0.12:3000`.
    #[must_use]
    pub fn host_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

fn default_probe_binary() -> String {
    "probe-rs".into()
}

/// Time budgets for probe tool invocations.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Hard budget for `download`.
    #[serde(default = "default_flash_seconds")]
    pub flash_seconds: u64,
    /// Budget for `list` and `reset`.
    #[serde(default = "default_command_seconds")]
    pub command_seconds: u64,
    /// Default log budget for `attach`; 0 means no budget.
    #[serde(default = "default_attach_seconds")]
    pub attach_seconds: u64,
    /// How long to wait for an exit status after the output closes.
    #[serde(default = "default_exit_grace_millis")]
    pub exit_grace_millis: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            flash_seconds: default_flash_seconds(),
            command_seconds: default_command_seconds(),
            attach_seconds: default_attach_seconds(),
            exit_grace_millis: default_exit_grace_millis(),
        }
    }
}

impl TimeoutConfig {
    /// Budget for flashing.
    #[must_use]
    pub fn flash(&self) -> Duration {
        Duration::from_secs(self.flash_seconds)
    }

    /// Budget for one-shot commands other than flashing.
    #[must_use]
    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_seconds)
    }

    /// Default attach budget, `None` when disabled.
    #[must_use]
    pub fn attach(&self) -> Option<Duration> {
        (self.attach_seconds > 0).then(|| Duration::from_secs(self.attach_seconds))
    }

    /// Grace period for collecting the exit status after EOF.
    #[must_use]
    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_millis)
    }
}

fn default_flash_seconds() -> u64 {
    20
}

fn default_command_seconds() -> u64 {
    60
}

fn default_attach_seconds() -> u64 {
    10
}

fn default_exit_grace_millis() -> u64 {
    1000
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Directory the probe tool is started in; relative firmware paths
    /// resolve against it.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Probe server and target settings.
    pub connection: ConnectionConfig,
    /// Time budgets.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Fill in the probe token from the OS keychain or `PROBE_RS_TOKEN`
    /// when the config file did not provide one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither source yields a token.
    pub async fn load_credentials(&mut self) -> Result<()> {
        if self.connection.token.is_empty() {
            self.connection.token = load_credential(TOKEN_KEYRING_KEY, TOKEN_ENV_VAR).await?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.connection.host.trim().is_empty() {
            return Err(AppError::Config("connection.host must not be empty".into()));
        }

        if self.connection.port == 0 {
            return Err(AppError::Config(
                "connection.port must be greater than zero".into(),
            ));
        }

        if self.connection.chip.trim().is_empty() {
            return Err(AppError::Config("connection.chip must not be empty".into()));
        }

        if self.connection.probe_binary.trim().is_empty() {
            return Err(AppError::Config(
                "connection.probe_binary must not be empty".into(),
            ));
        }

        if self.timeouts.flash_seconds == 0 || self.timeouts.command_seconds == 0 {
            return Err(AppError::Config(
                "timeouts.flash_seconds and timeouts.command_seconds must be greater than zero"
                    .into(),
            ));
        }

        if let Some(dir) = &self.working_dir {
            let canonical = dir
                .canonicalize()
                .map_err(|err| AppError::Config(format!("working_dir invalid: {err}")))?;
            self.working_dir = Some(canonical);
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
