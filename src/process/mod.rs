//! Subprocess plumbing for the frontend server.
//!
//! A spawned child is exposed as a set of channels rather than a process
//! handle: a writer for stdin, line channels for stdout and stderr, a kill
//! trigger, and a oneshot carrying the exit code. The session and batch
//! driver only ever see this shape, so tests substitute a scripted child
//! behind the same trait.

use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

/// One spawned child, as seen by the driver.
pub struct ChildChannels {
    /// Exclusive writer for the child's stdin.
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,

    /// Lines read from the child's stdout. Closes at EOF.
    pub stdout: mpsc::UnboundedReceiver<String>,

    /// Lines read from the child's stderr. Closes at EOF.
    pub stderr: mpsc::UnboundedReceiver<String>,

    /// Resolves with the exit code once the child has exited.
    pub exit: oneshot::Receiver<i32>,

    /// Fire to kill the child. Dropping the channels has the same effect.
    pub kill: Option<oneshot::Sender<()>>,
}

/// Starts compiler subprocesses.
pub trait Spawner: Send + Sync {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<ChildChannels>;
}

/// Spawner backed by `tokio::process`. Must be called from within a tokio
/// runtime; the reader and supervisor tasks are spawned onto it.
#[derive(Default)]
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<ChildChannels> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        tracing::debug!("spawned {} (pid {:?})", program.display(), child.id());

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("child stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr was not piped"))?;

        let stdout_rx = read_lines(stdout);
        let stderr_rx = read_lines(stderr);

        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let code = tokio::select! {
                status = child.wait() => exit_code(status),
                _ = &mut kill_rx => {
                    let _ = child.kill().await;
                    exit_code(child.wait().await)
                }
            };
            tracing::debug!("child exited with code {code}");
            let _ = exit_tx.send(code);
        });

        Ok(ChildChannels {
            stdin: Box::new(stdin),
            stdout: stdout_rx,
            stderr: stderr_rx,
            exit: exit_rx,
            kill: Some(kill_tx),
        })
    }
}

fn exit_code(status: io::Result<std::process::ExitStatus>) -> i32 {
    status.ok().and_then(|status| status.code()).unwrap_or(-1)
}

fn read_lines(
    stream: impl tokio::io::AsyncRead + Send + Unpin + 'static,
) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut lines = BufReader::new(stream).lines();
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
