//! Child spawning with stdout and stderr merged into one line stream.
//!
//! On unix both descriptors of the child are the write end of a single OS
//! pipe, so lines arrive in exactly the order the child wrote them. The child
//! also leads its own process group so that stop signals reach any helpers it
//! spawns. Elsewhere the two pipes are read separately and interleaved as
//! lines become available.

use std::pin::Pin;
use std::process::Stdio;

use futures_util::Stream;
use tokio::process::Child;
use tokio_util::codec::FramedRead;

use crate::command::Command;
use crate::process::codec::LogLineCodec;
use crate::{AppError, Result};

/// Merged, framed output of one child process.
pub type LineSource = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Spawn `command` and return the child together with its merged output.
///
/// The child is spawned with `kill_on_drop(true)` and a null stdin.
///
/// # Errors
///
/// Returns `AppError::Process` if the argument vector is empty, the output
/// pipe cannot be created, or the OS refuses to spawn the program.
pub fn spawn_merged(command: &Command) -> Result<(Child, LineSource)> {
    let program = command
        .program()
        .ok_or_else(|| AppError::Process("empty argument vector".into()))?;

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(command.args())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    if let Some(dir) = command.dir() {
        cmd.current_dir(dir);
    }

    spawn_with_output(cmd, program)
}

#[cfg(unix)]
fn spawn_with_output(
    mut cmd: tokio::process::Command,
    program: &str,
) -> Result<(Child, LineSource)> {
    use std::os::fd::OwnedFd;

    use tokio::net::unix::pipe;

    let (reader, writer) = std::io::pipe()
        .map_err(|err| AppError::Process(format!("failed to create output pipe: {err}")))?;
    let stderr_writer = writer
        .try_clone()
        .map_err(|err| AppError::Process(format!("failed to duplicate output pipe: {err}")))?;

    cmd.stdout(writer).stderr(stderr_writer).process_group(0);

    let child = cmd
        .spawn()
        .map_err(|err| AppError::Process(format!("failed to spawn {program}: {err}")))?;

    // The parent's copies of the write end live in `cmd`; EOF only arrives
    // once they are closed.
    drop(cmd);

    let receiver = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))
        .map_err(|err| AppError::Process(format!("failed to register output pipe: {err}")))?;

    Ok((child, Box::pin(FramedRead::new(receiver, LogLineCodec::new()))))
}

#[cfg(not(unix))]
fn spawn_with_output(
    mut cmd: tokio::process::Command,
    program: &str,
) -> Result<(Child, LineSource)> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|err| AppError::Process(format!("failed to spawn {program}: {err}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Process("failed to capture stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Process("failed to capture stderr".into()))?;

    let merged = futures_util::stream::select(
        FramedRead::new(stdout, LogLineCodec::new()),
        FramedRead::new(stderr, LogLineCodec::new()),
    );

    Ok((child, Box::pin(merged)))
}
