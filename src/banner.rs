//! Firmware boot banner expectations.
//!
//! Firmware prints `Launching: FW version=<v> hash=<h>` as its first log
//! line. Callers decide where version and hash come from (the command-line
//! front end reads `FW_VERSION` / `FW_HASH`); nothing here touches the
//! environment.

use crate::{AppError, Result};

/// Fixed start of every boot banner.
pub const BANNER_PREFIX: &str = "Launching: FW version=";

/// Full banner for a firmware build.
#[must_use]
pub fn expected_banner(version: &str, hash: &str) -> String {
    format!("{BANNER_PREFIX}{version} hash={hash}")
}

/// What a boot log line must contain to count as the banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BannerExpectation {
    /// Any banner, whatever the version.
    AnyVersion,
    /// The banner of one specific build.
    Exact(String),
}

impl BannerExpectation {
    /// Expect the exact banner when both parts are known, any banner otherwise.
    #[must_use]
    pub fn from_parts(version: Option<&str>, hash: Option<&str>) -> Self {
        match (version, hash) {
            (Some(version), Some(hash)) if !version.is_empty() && !hash.is_empty() => {
                Self::Exact(expected_banner(version, hash))
            }
            _ => Self::AnyVersion,
        }
    }

    /// Whether `line` carries the expected banner.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::AnyVersion => line.contains(BANNER_PREFIX),
            Self::Exact(banner) => line.contains(banner.as_str()),
        }
    }

    /// Check `line`, describing the mismatch on failure.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Verify` when the line does not match.
    pub fn check(&self, line: &str) -> Result<()> {
        if self.matches(line) {
            return Ok(());
        }
        let wanted = match self {
            Self::AnyVersion => BANNER_PREFIX,
            Self::Exact(banner) => banner.as_str(),
        };
        Err(AppError::Verify(format!(
            "unexpected boot line: {line:?} (expected {wanted:?})"
        )))
    }
}
