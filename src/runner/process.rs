//! Subprocess runner with timeout and process-group termination

use crate::runner::{CommandExecutor, CommandOutput, CommandRequest, RunnerError, Termination};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long to wait for output pipes to close once the child is gone
///
/// Background processes the child left behind can hold the pipes open.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs commands as child processes
///
/// Each child is started in its own process group so that a timeout or
/// cancellation takes down everything it spawned.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

enum Wait {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl CommandExecutor for CommandRunner {
    async fn execute(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, RunnerError> {
        let (program, args) = request
            .tokens
            .split_first()
            .ok_or(RunnerError::EmptyCommand)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        for name in &request.env_remove {
            command.env_remove(name);
        }
        command.envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        if let Some(dir) = &request.working_dir {
            command.current_dir(dir);
        }

        #[cfg(unix)]
        {
            command.process_group(0);
        }

        debug!("Spawning {} with {} argument(s)", program, args.len());
        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;
        // The id is gone once the child is reaped; the group outlives it
        let group = child.id();

        let mut stdout = StreamCapture::start(child.stdout.take());
        let mut stderr = StreamCapture::start(child.stderr.take());

        if let (Some(secret), Some(mut stdin)) = (&request.stdin, child.stdin.take()) {
            let written = async {
                stdin.write_all(secret.expose().as_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.shutdown().await
            }
            .await;
            if let Err(e) = written {
                debug!("Could not write stdin for {}: {}", program, e);
            }
        }

        let waited = tokio::select! {
            status = child.wait() => Wait::Exited(status),
            _ = tokio::time::sleep(request.timeout) => Wait::TimedOut,
            _ = cancel.cancelled() => Wait::Cancelled,
        };

        let (termination, exit_code) = match waited {
            Wait::Exited(status) => (Termination::Exited, status?.code()),
            Wait::TimedOut => {
                warn!(
                    "{} exceeded timeout of {}s, terminating",
                    program,
                    request.timeout.as_secs()
                );
                terminate(&mut child, group).await;
                (Termination::TimedOut, None)
            }
            Wait::Cancelled => {
                warn!("{} cancelled, terminating", program);
                terminate(&mut child, group).await;
                (Termination::Cancelled, None)
            }
        };
        let duration = started.elapsed();

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            tokio::join!(stdout.finish(), stderr.finish())
        })
        .await;
        if drained.is_err() {
            debug!(
                "Output of {} still open after {:?}, killing leftover processes",
                program, DRAIN_TIMEOUT
            );
            kill_group(group);
            stdout.abort();
            stderr.abort();
        }
        let stdout = stdout.contents().await;
        let stderr = stderr.contents().await;

        debug!(
            "{} finished in {}ms ({:?}, exit code {:?})",
            program,
            duration.as_millis(),
            termination,
            exit_code
        );

        Ok(CommandOutput {
            termination,
            exit_code,
            stdout,
            stderr,
            duration,
        })
    }
}

/// Output stream read in the background into a shared buffer
///
/// Whatever was read stays available if the reader is aborted.
struct StreamCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl StreamCapture {
    fn start<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reader = stream.map(|s| tokio::spawn(read_stream(s, buffer.clone())));
        Self { buffer, reader }
    }

    /// Wait for the stream to reach EOF
    async fn finish(&mut self) {
        if let Some(reader) = self.reader.as_mut() {
            if let Err(e) = reader.await {
                debug!("Output reader failed: {}", e);
            }
            self.reader = None;
        }
    }

    fn abort(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    async fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().await).into_owned()
    }
}

async fn read_stream<R: AsyncRead + Unpin>(mut reader: R, buffer: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.lock().await.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!("Output stream closed with error: {}", e);
                break;
            }
        }
    }
}

/// Kill the child's whole process group, then reap it
async fn terminate(child: &mut Child, group: Option<u32>) {
    kill_group(group);

    if let Err(e) = child.start_kill() {
        debug!("Failed to kill child: {}", e);
    }
    if let Err(e) = child.wait().await {
        debug!("Failed to reap child: {}", e);
    }
}

#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = group {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!("Failed to signal process group {}: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}
