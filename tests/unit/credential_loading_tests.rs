//! Unit tests for probe token loading.
//!
//! The test build has no platform keychain, so lookups fall through to
//! `PROBE_RS_TOKEN`. These tests mutate process-global env vars and must
//! run serially.

use probe_session::config::{GlobalConfig, TOKEN_ENV_VAR};

fn make_config(token: Option<&str>) -> GlobalConfig {
    let token_line = token.map(|t| format!("token = \"{t}\"")).unwrap_or_default();
    let toml = format!(
        r#"
[connection]
host = "127.0.0.1"
port = 3000
chip = "nRF52840_xxAA"
{token_line}
"#
    );
    GlobalConfig::from_toml_str(&toml).expect("config parses")
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn env_var_supplies_missing_token() {
    let mut config = make_config(None);

    unsafe {
        std::env::set_var(TOKEN_ENV_VAR, "env-token");
    }

    let result = config.load_credentials().await;
    assert!(result.is_ok(), "load_credentials should succeed: {result:?}");
    assert_eq!(config.connection.token, "env-token");

    unsafe {
        std::env::remove_var(TOKEN_ENV_VAR);
    }
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn token_from_file_wins_over_env_var() {
    let mut config = make_config(Some("file-token"));

    unsafe {
        std::env::set_var(TOKEN_ENV_VAR, "env-token");
    }

    config.load_credentials().await.expect("credentials load");
    assert_eq!(config.connection.token, "file-token");

    unsafe {
        std::env::remove_var(TOKEN_ENV_VAR);
    }
}

/// The error names both the keychain entry and the env var.
#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn missing_token_error_names_both_sources() {
    let mut config = make_config(None);

    unsafe {
        std::env::remove_var(TOKEN_ENV_VAR);
    }

    let err_msg = config.load_credentials().await.unwrap_err().to_string();
    assert!(err_msg.starts_with("config:"), "got: {err_msg}");
    assert!(err_msg.contains("probe_token"), "got: {err_msg}");
    assert!(err_msg.contains(TOKEN_ENV_VAR), "got: {err_msg}");
}

#[tokio::test]
#[serial_test::serial]
#[allow(unsafe_code)]
async fn empty_env_var_treated_as_absent() {
    let mut config = make_config(None);

    unsafe {
        std::env::set_var(TOKEN_ENV_VAR, "");
    }

    let result = config.load_credentials().await;
    assert!(result.is_err(), "empty env var must not count as a token");
    assert!(config.connection.token.is_empty());

    unsafe {
        std::env::remove_var(TOKEN_ENV_VAR);
    }
}
