//! Subprocess execution of generated scripts
//!
//! The script is written to a uniquely named temp file, the runtime is
//! spawned on it with stdout and stderr captured separately, and the file is
//! removed again on every path. Timeouts and cancellation kill the child
//! (its whole process group on unix) and still return the output captured
//! up to that point.

use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::core::config::RuntimeConfig;
use crate::core::{BridgeError, Result};
use crate::runtime::result::RunResult;

/// Extra environment for one run; wins over inherited and runtime variables
pub type EnvOverrides = BTreeMap<String, String>;

/// How long readers may keep draining pipes after the child is gone
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Executes a script body in the external runtime
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run `script` to completion, `timeout`, or cancellation.
    ///
    /// Fails only when the runtime cannot be launched or the script file
    /// cannot be written or removed; everything else is a `RunResult`.
    async fn run(
        &self,
        script: &str,
        env: &EnvOverrides,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<RunResult>;
}

/// Runs scripts with the configured interpreter
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    config: RuntimeConfig,
}

/// Bounded capture of one output stream
///
/// Keeps the start of the stream and, once the limit is reached, a rolling
/// window over its end. Terminal markers are printed last, so the end is the
/// part that must survive.
struct Capture {
    head: Vec<u8>,
    tail: VecDeque<u8>,
    head_limit: usize,
    tail_limit: usize,
    /// Bytes dropped between head and tail
    omitted: usize,
}

impl Capture {
    fn new(limit: usize) -> Self {
        let head_limit = limit / 4;
        Self {
            head: Vec::new(),
            tail: VecDeque::new(),
            head_limit,
            tail_limit: limit - head_limit,
            omitted: 0,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        let room = self.head_limit.saturating_sub(self.head.len()).min(bytes.len());
        let (head, rest) = bytes.split_at(room);
        self.head.extend_from_slice(head);
        self.tail.extend(rest);

        let overflow = self.tail.len().saturating_sub(self.tail_limit);
        if overflow > 0 {
            self.tail.drain(..overflow);
            self.omitted += overflow;
        }
    }

    fn into_text(self) -> String {
        let mut bytes = self.head;
        let mut tail: Vec<u8> = self.tail.into();
        if self.omitted > 0 {
            // Drop the partial line the window starts in
            let mut skipped = 0;
            if let Some(newline) = tail.iter().position(|b| *b == b'\n') {
                skipped = newline + 1;
                tail.drain(..skipped);
            }
            if !bytes.is_empty() && !bytes.ends_with(b"\n") {
                bytes.push(b'\n');
            }
            bytes.extend_from_slice(
                format!("[... {} bytes omitted ...]\n", self.omitted + skipped).as_bytes(),
            );
        }
        bytes.extend_from_slice(&tail);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

type SharedCapture = Arc<Mutex<Capture>>;

fn lock(capture: &SharedCapture) -> MutexGuard<'_, Capture> {
    capture.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read `reader` to EOF, keeping at most about `limit` bytes
fn spawn_capture<R>(mut reader: R, limit: usize) -> (SharedCapture, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let capture = Arc::new(Mutex::new(Capture::new(limit)));
    let sink = Arc::clone(&capture);
    let handle = tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => lock(&sink).push(&chunk[..n]),
                Err(e) => {
                    warn!(err = %e, "failed to read child output");
                    break;
                }
            }
        }
    });
    (capture, handle)
}

fn take_text(capture: &SharedCapture, stream: &str) -> String {
    let mut capture = lock(capture);
    if capture.omitted > 0 {
        warn!(stream, omitted = capture.omitted, "output truncated");
    }
    let limit = capture.head_limit + capture.tail_limit;
    std::mem::replace(&mut *capture, Capture::new(limit)).into_text()
}

enum Exit {
    Exited(std::process::ExitStatus),
    /// The child could not be waited on; its fate is unknown
    Lost(std::io::Error),
    TimedOut,
    Cancelled,
}

impl ProcessRunner {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Interpreter binary this runner launches
    pub fn binary(&self) -> &Path {
        &self.config.binary
    }

    fn command(&self, script_path: &Path, env: &EnvOverrides) -> Command {
        let mut std_cmd = std::process::Command::new(&self.config.binary);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        let mut cmd = Command::from(std_cmd);
        cmd.arg(script_path);
        for (key, value) in self.config.location_env() {
            cmd.env(key, value);
        }
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn launch_error(&self, e: std::io::Error) -> BridgeError {
        let binary = self.config.binary.display().to_string();
        if e.kind() == std::io::ErrorKind::NotFound {
            BridgeError::launch(
                binary,
                "runtime binary not found; install Python 3 or set runtime.binary",
            )
        } else {
            BridgeError::launch(binary, e.to_string())
        }
    }

    async fn write_script(&self, script: &str) -> Result<TempPath> {
        let body = script.to_owned();
        let dir: Option<PathBuf> = self.config.script_dir.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
            let mut builder = tempfile::Builder::new();
            builder.prefix("browsebridge-").suffix(".py");
            let mut file = match dir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)?;
                    builder.tempfile_in(dir)?
                }
                None => builder.tempfile()?,
            };
            file.write_all(body.as_bytes())?;
            file.flush()?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(|e| BridgeError::script_io(format!("script writer failed: {}", e)))?
        .map_err(|e| BridgeError::script_io(format!("failed to write script: {}", e)))
    }

    async fn remove_script(path: TempPath) -> Result<()> {
        tokio::task::spawn_blocking(move || path.close())
            .await
            .map_err(|e| BridgeError::script_io(format!("script remover failed: {}", e)))?
            .map_err(|e| BridgeError::script_io(format!("failed to remove script: {}", e)))
    }

    async fn execute(
        &self,
        script_path: &Path,
        env: &EnvOverrides,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let started = Instant::now();

        debug!(
            script = %script_path.display(),
            overrides = ?env.keys().collect::<Vec<_>>(),
            "spawning runtime"
        );
        let mut child = match self.command(script_path, env).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(err = %e, "failed to spawn runtime");
                return Err(self.launch_error(e));
            }
        };
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Other("stdout was not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::Other("stderr was not piped".to_string()))?;

        let limit = self.config.output_limit_bytes;
        let (out_capture, mut out_task) = spawn_capture(stdout, limit);
        let (err_capture, mut err_task) = spawn_capture(stderr, limit);

        let exit = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => Exit::Exited(status),
                Err(e) => Exit::Lost(e),
            },
            _ = tokio::time::sleep(timeout) => Exit::TimedOut,
            _ = cancel.cancelled() => Exit::Cancelled,
        };

        match exit {
            Exit::Exited(_) => {}
            Exit::Lost(ref e) => {
                error!(err = %e, "failed to wait for runtime, killing");
                terminate(&mut child, pid).await;
            }
            Exit::TimedOut => {
                warn!(timeout_secs = timeout.as_secs(), "runtime timed out, killing");
                terminate(&mut child, pid).await;
            }
            Exit::Cancelled => {
                debug!("run cancelled, killing runtime");
                terminate(&mut child, pid).await;
            }
        }

        let drained = tokio::time::timeout(DRAIN_GRACE, async {
            let _ = (&mut out_task).await;
            let _ = (&mut err_task).await;
        })
        .await;
        if drained.is_err() {
            // Something outside our reach still holds the pipes open
            warn!("output pipes still open after exit, killing stragglers");
            kill_group(pid);
            out_task.abort();
            err_task.abort();
        }

        let stdout = take_text(&out_capture, "stdout");
        let stderr = take_text(&err_capture, "stderr");

        let result = match exit {
            Exit::Exited(status) => RunResult::exited(status.code().unwrap_or(-1), stdout, stderr),
            Exit::Lost(e) => RunResult::lost(format!("failed to wait for runtime: {}", e), stdout, stderr),
            Exit::TimedOut => RunResult::timed_out(timeout, stdout, stderr),
            Exit::Cancelled => RunResult::cancelled(stdout, stderr),
        }
        .with_elapsed(started.elapsed());

        debug!(
            exit_code = result.exit_code,
            succeeded = result.succeeded,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "runtime finished"
        );
        Ok(result)
    }
}

#[async_trait]
impl ScriptRunner for ProcessRunner {
    #[instrument(skip_all, fields(binary = %self.config.binary.display(), timeout_secs = timeout.as_secs()))]
    async fn run(
        &self,
        script: &str,
        env: &EnvOverrides,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let script_path = self.write_script(script).await?;

        let outcome = self.execute(&script_path, env, timeout, cancel).await;
        let removal = Self::remove_script(script_path).await;

        if let Err(ref e) = removal {
            error!(err = %e, "script file left behind");
        }
        let result = outcome?;
        removal?;
        Ok(result)
    }
}

/// Kill the child and, on unix, everything it spawned into its group
async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    if let Err(e) = child.kill().await {
        debug!(err = %e, "child already gone");
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            debug!(err = %e, pgid = pid, "process group already gone");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}
