//! Owned subprocess with bounded output capture and a kill deadline
//!
//! Each output stream keeps only its last `max_output_bytes`; the rest is
//! read and discarded so the child never blocks on a full pipe.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;

use super::FetchError;

const READ_CHUNK: usize = 8 * 1024;

/// What to run and the limits to run it under
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// Captured result of a finished process
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Either stream exceeded the byte budget and lost its head
    pub truncated: bool,
}

/// Keeps the last `limit` bytes pushed into it
#[derive(Debug)]
struct TailBuffer {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl TailBuffer {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        if chunk.len() >= self.limit {
            self.truncated |= chunk.len() > self.limit || !self.bytes.is_empty();
            self.bytes.clear();
            self.bytes.extend_from_slice(&chunk[chunk.len() - self.limit..]);
            return;
        }

        let overflow = (self.bytes.len() + chunk.len()).saturating_sub(self.limit);
        if overflow > 0 {
            self.bytes.drain(..overflow);
            self.truncated = true;
        }
        self.bytes.extend_from_slice(chunk);
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

async fn read_tail<R>(mut reader: R, limit: usize) -> io::Result<TailBuffer>
where
    R: AsyncRead + Unpin,
{
    let mut tail = TailBuffer::new(limit);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            return Ok(tail);
        }
        tail.push(&chunk[..read]);
    }
}

/// Run a process to completion
///
/// The child is killed when `invocation.timeout` elapses or when the returned
/// future is dropped.
///
/// # Errors
/// - `FetchError::Spawn` if the program cannot be started
/// - `FetchError::Timeout` if the deadline passes
/// - `FetchError::Io` if waiting or reading the pipes fails
pub async fn run(invocation: &Invocation) -> Result<ProcessOutput, FetchError> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &invocation.working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(FetchError::Spawn)?;
    tracing::debug!(program = %invocation.program.display(), args = ?invocation.args, "Spawned fetch process");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| FetchError::Io(io::Error::other("stdout was not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| FetchError::Io(io::Error::other("stderr was not captured")))?;

    let limit = invocation.max_output_bytes.max(1);
    let outcome = timeout(invocation.timeout, async {
        tokio::try_join!(
            child.wait(),
            read_tail(stdout, limit),
            read_tail(stderr, limit),
        )
    })
    .await;

    match outcome {
        Ok(Ok((status, stdout, stderr))) => Ok(ProcessOutput {
            status,
            truncated: stdout.truncated || stderr.truncated,
            stdout: stdout.into_string(),
            stderr: stderr.into_string(),
        }),
        Ok(Err(error)) => Err(FetchError::Io(error)),
        Err(_) => {
            tracing::warn!(
                program = %invocation.program.display(),
                timeout_ms = invocation.timeout.as_millis() as u64,
                "Fetch process timed out; killing"
            );
            if let Err(error) = child.kill().await {
                tracing::warn!(%error, "Failed to kill timed-out fetch process");
            }
            Err(FetchError::Timeout(invocation.timeout))
        }
    }
}
