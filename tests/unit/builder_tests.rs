//! Unit tests for probe tool argument vectors.

use std::path::Path;

use probe_session::command::{build_args, ProbeAction};
use probe_session::config::{ConnectionConfig, Scheme};
use probe_session::AppError;

fn connection() -> ConnectionConfig {
    ConnectionConfig {
        host: "192.168.1.40".into(),
        port: 3000,
        scheme: Scheme::Ws,
        chip: "nRF52840_xxAA".into(),
        probe_binary: "probe-rs".into(),
        token: "tok".into(),
    }
}

const BASE: [&str; 5] = ["probe-rs", "--host", "ws://192.168.1.40:3000", "--token", "tok"];

fn expect(tail: &[&str]) -> Vec<String> {
    BASE.iter().chain(tail).map(|s| (*s).to_owned()).collect()
}

#[test]
fn list_has_no_chip() {
    let argv = build_args(&connection(), ProbeAction::List).unwrap();
    assert_eq!(argv, expect(&["list"]));
}

#[test]
fn download_passes_chip_then_path() {
    let argv = build_args(
        &connection(),
        ProbeAction::Download {
            firmware: Path::new("fw/eps"),
        },
    )
    .unwrap();
    assert_eq!(
        argv,
        expect(&["download", "--chip", "nRF52840_xxAA", "fw/eps"])
    );
}

#[test]
fn reset_passes_chip() {
    let argv = build_args(&connection(), ProbeAction::Reset).unwrap();
    assert_eq!(argv, expect(&["reset", "--chip", "nRF52840_xxAA"]));
}

#[test]
fn attach_connects_under_reset() {
    let argv = build_args(
        &connection(),
        ProbeAction::Attach {
            firmware: Path::new("fw/eps"),
        },
    )
    .unwrap();
    assert_eq!(
        argv,
        expect(&[
            "attach",
            "--chip",
            "nRF52840_xxAA",
            "fw/eps",
            "--connect-under-reset"
        ])
    );
}

#[test]
fn wss_scheme_is_used_in_host_url() {
    let mut conn = connection();
    conn.scheme = Scheme::Wss;
    let argv = build_args(&conn, ProbeAction::List).unwrap();
    assert_eq!(argv[2], "wss://192.168.1.40:3000");
}

#[test]
fn empty_token_is_rejected_for_every_action() {
    let mut conn = connection();
    conn.token.clear();
    let firmware = Path::new("fw/eps");

    for action in [
        ProbeAction::List,
        ProbeAction::Reset,
        ProbeAction::Download { firmware },
        ProbeAction::Attach { firmware },
    ] {
        let err = build_args(&conn, action).unwrap_err();
        assert!(matches!(err, AppError::Config(_)), "{action:?}: {err}");
    }
}

#[test]
fn empty_chip_is_rejected_where_needed() {
    let mut conn = connection();
    conn.chip.clear();

    assert!(build_args(&conn, ProbeAction::List).is_ok());
    let err = build_args(
        &conn,
        ProbeAction::Download {
            firmware: Path::new("fw/eps"),
        },
    )
    .unwrap_err();
    assert!(err.to_string().contains("download"));
}

#[test]
fn action_names_match_tool_sub_commands() {
    let firmware = Path::new("x");
    assert_eq!(ProbeAction::List.name(), "list");
    assert_eq!(ProbeAction::Download { firmware }.name(), "download");
    assert_eq!(ProbeAction::Reset.name(), "reset");
    assert_eq!(ProbeAction::Attach { firmware }.name(), "attach");
}
