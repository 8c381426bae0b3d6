//! Unit tests for `AppError` display format and accessors.

use std::time::Duration;

use probe_session::AppError;

#[test]
fn display_uses_category_prefix() {
    assert_eq!(AppError::Config("bad".into()).to_string(), "config: bad");
    assert_eq!(AppError::Process("gone".into()).to_string(), "process: gone");
    assert_eq!(AppError::Verify("nope".into()).to_string(), "verify: nope");
    assert_eq!(AppError::Io("eof".into()).to_string(), "io: eof");
}

#[test]
fn command_failed_reports_exit_code() {
    let err = AppError::CommandFailed {
        exit_code: Some(3),
        output: "Error: no probe found".into(),
    };
    assert_eq!(err.to_string(), "command failed: exit code 3");
    assert_eq!(err.exit_code(), Some(3));
    assert_eq!(err.output(), Some("Error: no probe found"));
    assert!(!err.is_timeout());
}

#[test]
fn command_failed_by_signal_has_no_code() {
    let err = AppError::CommandFailed {
        exit_code: None,
        output: String::new(),
    };
    assert_eq!(err.to_string(), "command failed: terminated by signal");
    assert_eq!(err.exit_code(), None);
}

#[test]
fn timeout_reports_budget_and_keeps_output() {
    let err = AppError::Timeout {
        budget: Duration::from_millis(20_500),
        output: "Erasing...".into(),
    };
    assert_eq!(err.to_string(), "timeout: exceeded 20.5s");
    assert!(err.is_timeout());
    assert_eq!(err.output(), Some("Erasing..."));
    assert_eq!(err.exit_code(), None);
}

#[test]
fn plain_variants_carry_no_output() {
    assert_eq!(AppError::Config("x".into()).output(), None);
    assert_eq!(AppError::Process("x".into()).exit_code(), None);
}

#[test]
fn error_message_no_trailing_period() {
    let s = AppError::Process("failed to spawn probe-rs".into()).to_string();
    assert!(
        !s.ends_with('.'),
        "error message must not end with a period: {s}"
    );
}

#[test]
fn io_error_converts_to_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err = AppError::from(io);
    assert!(matches!(err, AppError::Io(_)));
    assert!(err.to_string().contains("missing"));
}

#[test]
fn toml_error_converts_to_config_variant() {
    let parse = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
    let err = AppError::from(parse);
    assert!(err.to_string().starts_with("config: invalid config:"));
}
