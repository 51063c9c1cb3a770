//! Child process plumbing shared by the local and SSH channels

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{ChannelError, ChannelOutput};

/// Spawn `cmd`, feed `stdin` while draining stdout/stderr, and wait for exit.
///
/// stdin is written on its own future so large payloads cannot deadlock
/// against a child blocked on a full stdout pipe.
pub async fn run_process(
    mut cmd: Command,
    label: &str,
    stdin: Option<Vec<u8>>,
    timeout: Option<Duration>,
) -> Result<ChannelOutput, ChannelError> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let mut child = cmd.spawn().map_err(|source| ChannelError::Spawn {
        program: program.clone(),
        source,
    })?;

    let pipe = child.stdin.take();
    let feed = async move {
        if let (Some(mut pipe), Some(data)) = (pipe, stdin) {
            match pipe.write_all(&data).await {
                Ok(()) => {}
                // The child may exit without reading everything
                Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
                Err(e) => return Err(e),
            }
            pipe.shutdown().await.or_else(|e| {
                if e.kind() == ErrorKind::BrokenPipe {
                    Ok(())
                } else {
                    Err(e)
                }
            })?;
        }
        Ok::<(), std::io::Error>(())
    };

    let finished = async {
        let (fed, output) = futures::future::join(feed, child.wait_with_output()).await;
        fed.map_err(|e| ChannelError::io(format!("stdin of {program}"), e))?;
        output.map_err(|e| ChannelError::io(program.clone(), e))
    };

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, finished)
            .await
            .map_err(|_| ChannelError::Timeout {
                command: label.to_string(),
                seconds: limit.as_secs(),
            })??,
        None => finished.await?,
    };

    let rc = exit_code(&output.status);
    debug!("{} exited with rc={}", label, rc);

    Ok(ChannelOutput {
        rc,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

fn exit_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
