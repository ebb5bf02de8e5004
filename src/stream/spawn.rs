//! Run an external executable as a byte [`Transform`].
//!
//! Input chunks are written to the child's stdin and stdout chunks come out
//! unchanged. A supervisor task owns the child and moves it through
//! `Running -> Closed | Failed`. Every failure source (spawn, stdin, stderr
//! output, non-zero exit) funnels through one transition into `Failed`, so a
//! process yields at most one error. The exit status is watched the whole
//! time, so a process that dies while its input is still open fails the
//! output without waiting for the input to end.

use crate::error::{Item, StreamError};
use crate::options::StreamOptions;
use crate::stream::role::{Inbox, Inlet, Source, Transform};
use futures::StreamExt;
use std::ffi::OsStr;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

const STDOUT_CHUNK: usize = 64 * 1024;
const STDERR_CHUNK: usize = 4 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ProcessState {
    Running,
    Closed,
    Failed,
}

/// Spawn `command` immediately and expose its stdin/stdout as a transform.
///
/// The output ends once stdout reaches EOF and the process exited with code
/// 0, even if the input side is still open. Dropping the output side kills
/// the process.
///
/// # Panics
/// When called outside a tokio runtime.
pub fn spawn_transform<C, A, S>(command: &str, args: A) -> Transform<C, Vec<u8>>
where
    C: AsRef<[u8]> + Send + 'static,
    A: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    spawn_transform_with(command, args, StreamOptions::default())
}

/// [`spawn_transform`] with explicit buffering.
///
/// # Panics
/// When called outside a tokio runtime.
pub fn spawn_transform_with<C, A, S>(command: &str, args: A, options: StreamOptions) -> Transform<C, Vec<u8>>
where
    C: AsRef<[u8]> + Send + 'static,
    A: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let (in_tx, in_rx) = mpsc::channel(options.capacity());
    let (out_tx, out_rx) = mpsc::channel(options.capacity());
    let transform = Transform::from_parts(
        Inlet::new(in_tx),
        Source::from_results(ReceiverStream::new(out_rx)),
    );

    let spawned = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    match spawned {
        Ok(child) => {
            debug!(command, pid = child.id(), "spawned process");
            tokio::spawn(supervise(command.to_owned(), child, ReceiverStream::new(in_rx), out_tx));
        }
        Err(source) => {
            warn!(command, error = %source, "failed to spawn process");
            // The channel is empty, so the error always fits.
            let _ = out_tx.try_send(Err(StreamError::ProcessSpawn {
                command: command.to_owned(),
                source,
            }));
        }
    }
    transform
}

struct Supervisor {
    command: String,
    child: Child,
    out: mpsc::Sender<Item<Vec<u8>>>,
}

impl Supervisor {
    /// The single transition into `Failed`.
    async fn fail(&mut self, err: StreamError) -> ProcessState {
        warn!(command = %self.command, error = %err, "process failed");
        if let Err(kill) = self.child.start_kill() {
            trace!(command = %self.command, error = %kill, "kill after failure");
        }
        // Nobody may be listening anymore.
        let _ = self.out.send(Err(err)).await;
        ProcessState::Failed
    }

    /// Handle the exit status. A clean exit stays `Running` until stdout is
    /// drained; anything else fails at once.
    async fn exited(&mut self, status: io::Result<ExitStatus>, stderr: &mut ChildStderr) -> ProcessState {
        match status {
            Ok(status) if status.success() => {
                let mut rest = Vec::new();
                match stderr.read_to_end(&mut rest).await {
                    Ok(_) if rest.is_empty() => {
                        debug!(command = %self.command, "process exited cleanly");
                        ProcessState::Running
                    }
                    Ok(_) => {
                        let message = stderr_message(&rest);
                        let command = self.command.clone();
                        self.fail(StreamError::ProcessStderr { command, message }).await
                    }
                    Err(err) => self.fail(StreamError::Io(err)).await,
                }
            }
            Ok(status) => {
                let command = self.command.clone();
                let code = status.code().unwrap_or(-1);
                self.fail(StreamError::ProcessExit { command, code }).await
            }
            Err(err) => self.fail(StreamError::Io(err)).await,
        }
    }

    async fn fed(&mut self, joined: Result<Result<(), StreamError>, JoinError>) -> ProcessState {
        match joined {
            Ok(Ok(())) => {
                trace!(command = %self.command, "stdin closed");
                ProcessState::Running
            }
            Ok(Err(err)) => self.fail(err).await,
            Err(join) => {
                let command = self.command.clone();
                let source = io::Error::other(join);
                self.fail(StreamError::ProcessStdin { command, source }).await
            }
        }
    }
}

fn stderr_message(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_owned()
}

async fn supervise<C>(command: String, mut child: Child, inbox: Inbox<C>, out: mpsc::Sender<Item<Vec<u8>>>)
where
    C: AsRef<[u8]> + Send + 'static,
{
    let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
    let mut sup = Supervisor { command, child, out };
    let (Some(stdin), Some(mut stdout), Some(mut stderr)) = pipes else {
        let command = sup.command.clone();
        let source = io::Error::other("stdio was not captured");
        sup.fail(StreamError::ProcessSpawn { command, source }).await;
        return;
    };

    let mut feeder = tokio::spawn(feed_stdin(sup.command.clone(), stdin, inbox));
    let mut feeder_done = false;
    let mut stdout_done = false;
    let mut stderr_open = true;
    let mut exited = false;
    let mut stdout_buf = vec![0u8; STDOUT_CHUNK];
    let mut stderr_buf = vec![0u8; STDERR_CHUNK];
    let mut state = ProcessState::Running;

    while state == ProcessState::Running {
        tokio::select! {
            biased;
            () = sup.out.closed() => {
                debug!(command = %sup.command, "output dropped; killing process");
                if let Err(err) = sup.child.start_kill() {
                    trace!(command = %sup.command, error = %err, "kill after drop");
                }
                state = ProcessState::Closed;
            }
            read = stderr.read(&mut stderr_buf), if stderr_open => match read {
                Ok(0) => stderr_open = false,
                Ok(n) => {
                    let command = sup.command.clone();
                    let message = stderr_message(&stderr_buf[..n]);
                    state = sup.fail(StreamError::ProcessStderr { command, message }).await;
                }
                Err(err) => state = sup.fail(StreamError::Io(err)).await,
            },
            joined = &mut feeder, if !feeder_done => {
                feeder_done = true;
                state = sup.fed(joined).await;
            }
            read = stdout.read(&mut stdout_buf), if !stdout_done => match read {
                Ok(0) => stdout_done = true,
                Ok(n) => {
                    if sup.out.send(Ok(stdout_buf[..n].to_vec())).await.is_err() {
                        state = ProcessState::Closed;
                    }
                }
                Err(err) => state = sup.fail(StreamError::Io(err)).await,
            },
            status = sup.child.wait(), if !exited => {
                exited = true;
                state = sup.exited(status, &mut stderr).await;
            }
        }

        if state == ProcessState::Running && exited && stdout_done {
            // An upstream error already handed to the feeder wins over a clean exit.
            if !feeder_done && feeder.is_finished() {
                feeder_done = true;
                state = sup.fed((&mut feeder).await).await;
            }
            if state == ProcessState::Running {
                state = ProcessState::Closed;
            }
        }
    }
    feeder.abort();
}

/// Copy input chunks into the child's stdin, then close it.
///
/// The child closing its stdin early (like `head`) is not an error.
async fn feed_stdin<C>(command: String, mut stdin: ChildStdin, mut inbox: Inbox<C>) -> Result<(), StreamError>
where
    C: AsRef<[u8]>,
{
    while let Some(item) = inbox.next().await {
        let chunk = item?;
        match stdin.write_all(chunk.as_ref()).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                trace!(command = %command, "process closed stdin early");
                return Ok(());
            }
            Err(source) => return Err(StreamError::ProcessStdin { command, source }),
        }
    }
    drop(stdin);
    Ok(())
}
