//! Integration tests for `ProbeDriver` operations against a fake probe tool.

use std::time::{Duration, Instant};

use probe_session::banner::BannerExpectation;
use probe_session::process::{LineEvent, ProcessState};
use probe_session::{AppError, ProbeDriver};

use super::test_helpers::{drain, fake_probe, test_config, BANNER};

/// Prints its arguments on one line and exits 0.
const ECHO_ARGS: &str = "echo \"$*\"";

#[tokio::test]
#[serial_test::serial]
async fn list_probes_returns_tool_output() {
    let probe = fake_probe(ECHO_ARGS);
    let driver = ProbeDriver::new(test_config(&probe.path));

    let output = driver.list_probes().await.expect("list succeeds");
    assert_eq!(
        output,
        "--host ws://127.0.0.1:3000 --token test-token list\n"
    );
}

#[tokio::test]
#[serial_test::serial]
async fn flash_passes_chip_and_firmware() {
    let probe = fake_probe(
        "case \"$*\" in\n\
         *'download --chip nRF52840_xxAA fw.elf') echo 'Finished in 1.0s'; exit 0 ;;\n\
         *) echo \"unexpected: $*\"; exit 1 ;;\n\
         esac",
    );
    let driver = ProbeDriver::new(test_config(&probe.path));

    driver.flash("fw.elf").await.expect("flash succeeds");
}

#[tokio::test]
#[serial_test::serial]
async fn flash_failure_carries_exit_code_and_output() {
    let probe = fake_probe("echo 'Error: failed to erase flash' >&2\nexit 3");
    let driver = ProbeDriver::new(test_config(&probe.path));

    let err = driver.flash("fw.elf").await.unwrap_err();
    assert_eq!(err.exit_code(), Some(3));
    assert!(err
        .output()
        .is_some_and(|o| o.contains("failed to erase flash")));
}

#[tokio::test]
#[serial_test::serial]
async fn flash_times_out_on_flash_budget() {
    let probe = fake_probe("echo Erasing\nexec sleep 30");
    let mut config = test_config(&probe.path);
    config.timeouts.flash_seconds = 1;
    let driver = ProbeDriver::new(config);

    let started = Instant::now();
    let err = driver.flash("fw.elf").await.unwrap_err();
    assert!(err.is_timeout(), "got: {err}");
    assert_eq!(err.output(), Some("Erasing\n"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
#[serial_test::serial]
async fn reset_passes_chip() {
    let probe = fake_probe(
        "[ \"$*\" = '--host ws://127.0.0.1:3000 --token test-token reset --chip nRF52840_xxAA' ]",
    );
    let driver = ProbeDriver::new(test_config(&probe.path));

    driver.reset().await.expect("reset succeeds");
}

#[tokio::test]
#[serial_test::serial]
async fn missing_token_fails_before_spawning() {
    let probe = fake_probe("touch \"$(dirname \"$0\")/spawned\"");
    let mut config = test_config(&probe.path);
    config.connection.token.clear();
    let driver = ProbeDriver::new(config);

    let err = driver.flash("fw.elf").await.unwrap_err();
    assert!(matches!(err, AppError::Config(_)), "got: {err}");
    assert!(!probe.dir().join("spawned").exists());
}

#[tokio::test]
#[serial_test::serial]
async fn attach_uses_connect_under_reset() {
    let probe = fake_probe(ECHO_ARGS);
    let driver = ProbeDriver::new(test_config(&probe.path));

    let mut stream = driver
        .attach_with_reset("fw.elf", None)
        .expect("attach starts");
    let events = drain(&mut stream).await;
    assert_eq!(
        events,
        vec![
            LineEvent::Line(
                "--host ws://127.0.0.1:3000 --token test-token attach --chip nRF52840_xxAA \
                 fw.elf --connect-under-reset"
                    .into()
            ),
            LineEvent::Ended { exit_code: 0 },
        ]
    );
}

/// Attach hands back the stream without waiting for output.
#[tokio::test]
#[serial_test::serial]
async fn attach_returns_before_first_line() {
    let probe = fake_probe(&format!("sleep 0.5\necho '{BANNER}'\nexec sleep 30"));
    let driver = ProbeDriver::new(test_config(&probe.path));

    let started = Instant::now();
    let mut stream = driver
        .attach_with_reset("fw.elf", Some(Duration::from_secs(10)))
        .expect("attach starts");
    assert!(started.elapsed() < Duration::from_millis(400));
    assert_eq!(stream.state(), ProcessState::Running);
    assert_eq!(stream.lines_delivered(), 0);

    let first = stream.next_line().await.unwrap().expect("banner line");
    BannerExpectation::from_parts(Some("1.2.3"), Some("abcd"))
        .check(&first)
        .expect("banner matches");

    stream.kill();
    stream.wait(Duration::from_secs(5)).await.expect("exits");
}

#[tokio::test]
#[serial_test::serial]
async fn attach_budget_defaults_to_config() {
    let probe = fake_probe("exec sleep 30");
    let mut config = test_config(&probe.path);
    config.timeouts.attach_seconds = 1;
    let driver = ProbeDriver::new(config);

    let stream = driver.attach_with_reset("fw.elf", None).expect("attach");
    assert_eq!(stream.budget(), Some(Duration::from_secs(1)));

    let mut config = test_config(&probe.path);
    config.timeouts.attach_seconds = 0;
    let driver = ProbeDriver::new(config);
    let stream = driver.attach_with_reset("fw.elf", None).expect("attach");
    assert_eq!(stream.budget(), None);
}

#[tokio::test]
#[serial_test::serial]
async fn attach_explicit_budget_times_out_silent_target() {
    let probe = fake_probe("exec sleep 30");
    let driver = ProbeDriver::new(test_config(&probe.path));

    let mut stream = driver
        .attach_with_reset("fw.elf", Some(Duration::from_millis(200)))
        .expect("attach starts");
    assert_eq!(stream.next_event().await, Some(LineEvent::TimedOut));
    assert_eq!(stream.next_event().await, None);
}

#[tokio::test]
#[serial_test::serial]
async fn wrong_banner_fails_verification() {
    let probe = fake_probe("echo 'Launching: FW version=0.9.0 hash=beef'");
    let driver = ProbeDriver::new(test_config(&probe.path));

    let mut stream = driver.attach_with_reset("fw.elf", None).expect("attach");
    let first = stream.next_line().await.unwrap().expect("one line");
    let err = BannerExpectation::from_parts(Some("1.2.3"), Some("abcd"))
        .check(&first)
        .unwrap_err();
    assert!(matches!(err, AppError::Verify(_)));
}

#[tokio::test]
#[serial_test::serial]
async fn flash_succeeds_when_tool_exits_after_closing_output() {
    let probe = fake_probe("echo 'Finished in 1.0s'\nexec >/dev/null 2>&1\nsleep 1.5\nexit 0");
    let driver = ProbeDriver::new(test_config(&probe.path));

    driver.flash("fw.elf").await.expect("flash succeeds");
}
