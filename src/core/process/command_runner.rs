use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::AppError;

/// How long an interrupted child may take to exit before it is killed.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: StreamKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    ExitedOk,
    ExitedWithError(String),
    Killed,
}

impl SessionStatus {
    /// Process exit status reported for this outcome; 130 mirrors a shell
    /// killed by SIGINT.
    pub fn exit_status(&self) -> u8 {
        match self {
            SessionStatus::ExitedOk => 0,
            SessionStatus::ExitedWithError(_) => 1,
            SessionStatus::Killed => 130,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub status: SessionStatus,
    /// Whether an interrupt was delivered to the child's process group.
    pub interrupt_sent: bool,
}

/// Runs shell command lines through `bash -c`.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    shell: String,
    kill_grace: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kill_grace(mut self, kill_grace: Duration) -> Self {
        self.kill_grace = kill_grace;
        self
    }

    /// Runs a short command and returns its stdout without trailing newlines.
    /// On a non-zero exit the command's stderr becomes the error message.
    pub async fn capture(&self, command_line: &str) -> Result<String, AppError> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AppError::ExecutionError(format!("{}: {}", command_line, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(AppError::DiscoveryError(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .trim_end_matches('\n')
            .to_string())
    }

    /// Spawns `command_line` in its own process group and streams every line of
    /// stdout and stderr to `sink` until the child exits. Stdin is `/dev/null`:
    /// a background process group reading the terminal would be stopped.
    ///
    /// When `cancel` fires while the child is alive, `SIGINT` is sent to the
    /// group once. Returns only after the child exited and both streams hit EOF.
    pub async fn run(
        &self,
        command_line: &str,
        cancel: CancellationToken,
        sink: UnboundedSender<OutputLine>,
    ) -> Result<RunReport, AppError> {
        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| AppError::ExecutionError(format!("failed to spawn {}: {}", self.shell, e)))?;
        debug!(pid = ?child.id(), "Spawned session command");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::ExecutionError("stdout pipe was not available".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::ExecutionError("stderr pipe was not available".into()))?;

        let stdout_task = spawn_line_reader(stdout, StreamKind::Stdout, sink.clone());
        let stderr_task = spawn_line_reader(stderr, StreamKind::Stderr, sink);

        let mut interrupt_sent = false;
        let exit = tokio::select! {
            status = child.wait() => status,
            _ = cancel.cancelled() => {
                interrupt_sent = self.interrupt(&mut child);
                self.wait_after_interrupt(&mut child).await
            }
        };
        let exit_status = exit.map_err(|e| AppError::ExecutionError(e.to_string()))?;

        for task in [stdout_task, stderr_task] {
            if let Err(e) = task.await {
                warn!("Output reader task failed: {}", e);
            }
        }

        let status = if cancel.is_cancelled() && interrupt_sent {
            SessionStatus::Killed
        } else if exit_status.success() {
            SessionStatus::ExitedOk
        } else {
            SessionStatus::ExitedWithError(exit_status.to_string())
        };
        debug!(?status, interrupt_sent, "Session command finished");

        Ok(RunReport {
            status,
            interrupt_sent,
        })
    }

    /// Delivers `SIGINT` to the child's process group unless it already exited.
    fn interrupt(&self, child: &mut Child) -> bool {
        if !still_running(child.try_wait()) {
            debug!("Child already exited; no interrupt sent");
            return false;
        }

        info!("[tele]: shut down command");
        match child.id() {
            Some(pid) => send_interrupt(pid, child),
            None => false,
        }
    }

    async fn wait_after_interrupt(&self, child: &mut Child) -> std::io::Result<std::process::ExitStatus> {
        match tokio::time::timeout(self.kill_grace, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    "Command did not exit within {:?} of the interrupt; killing it",
                    self.kill_grace
                );
                #[cfg(unix)]
                if let Some(pid) = child.id() {
                    // SAFETY: plain syscall on a process group we created.
                    unsafe {
                        libc::killpg(pid as libc::pid_t, libc::SIGKILL);
                    }
                }
                child.start_kill()?;
                child.wait().await
            }
        }
    }
}

/// A failed status check counts as running, so the child is still
/// interrupted and reaped.
fn still_running(state: std::io::Result<Option<std::process::ExitStatus>>) -> bool {
    match state {
        Ok(Some(_)) => false,
        Ok(None) => true,
        Err(e) => {
            warn!("Could not check the command's status: {}; interrupting anyway", e);
            true
        }
    }
}

#[cfg(unix)]
fn send_interrupt(pid: u32, _child: &mut Child) -> bool {
    // SAFETY: plain syscall; the group id equals the child's pid because it
    // was spawned with `process_group(0)`.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGINT) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        warn!("err: {}", err);
        return false;
    }
    true
}

#[cfg(not(unix))]
fn send_interrupt(_pid: u32, child: &mut Child) -> bool {
    match child.start_kill() {
        Ok(()) => true,
        Err(e) => {
            warn!("err: {}", e);
            false
        }
    }
}

fn spawn_line_reader<R>(
    reader: R,
    stream: StreamKind,
    sink: UnboundedSender<OutputLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(text)) => {
                    // Keep draining even if nobody listens, so the child never blocks on a full pipe.
                    let _ = sink.send(OutputLine { stream, text });
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(?stream, "Failed to read command output: {}", e);
                    break;
                }
            }
        }
    })
}
