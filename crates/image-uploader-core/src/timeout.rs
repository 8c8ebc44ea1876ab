use log::{debug, warn};
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run `command` to completion and collect its output, like
/// [`Command::output`], but kill it if it runs longer than `timeout`.
///
/// The process has exited (or been killed and reaped) by the time this
/// returns, so nothing it does can overlap with what the caller does next.
pub fn output_with_timeout(
    operation_name: &str,
    command: &mut Command,
    timeout: Duration,
) -> Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes while waiting so the process never blocks on a full pipe
    let stdout = drain(operation_name, child.stdout.take());
    let stderr = drain(operation_name, child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                warn!(
                    "TIMEOUT: {} took longer than {:?}, killing it",
                    operation_name, timeout
                );
                kill(&mut child, operation_name);
                return Err(Error::Timeout {
                    operation: operation_name.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill(&mut child, operation_name);
                return Err(e.into());
            }
        }
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

/// Read a pipe to the end on its own thread
fn drain<R>(operation_name: &str, pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe?;
    let spawned = thread::Builder::new()
        .name(format!("{}-pipe", operation_name.to_lowercase()))
        .spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            buffer
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Unable to read output of {}: {}", operation_name, e);
            None
        }
    }
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn kill(child: &mut Child, operation_name: &str) {
    if let Err(e) = child.kill() {
        warn!("Unable to kill {} (pid {}): {}", operation_name, child.id(), e);
    }
    match child.wait() {
        Ok(status) => debug!("{} ended with {}", operation_name, status),
        Err(e) => warn!("Unable to reap {}: {}", operation_name, e),
    }
}
