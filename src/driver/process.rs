//! Browser subprocess supervision.
//!
//! A supervisor task owns the child process. It waits for the process to
//! exit and publishes the exit status; kill requests reach it over a
//! channel. Dropping every handle to the process kills it.
//!
//! Kill sequence:
//!
//! 1. Interrupt (SIGINT on Unix, force-kill elsewhere)
//! 2. Wait [`KILL_GRACE_PERIOD`]
//! 3. Force-kill if still running

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::transport::Endpoint;

// ============================================================================
// Constants
// ============================================================================

/// Time between interrupt and force-kill.
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(3);

// ============================================================================
// ProcessExit
// ============================================================================

/// How the browser process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, absent when terminated by a signal or not observable.
    pub code: Option<i32>,

    /// Whether the process reported success.
    pub success: bool,
}

impl ProcessExit {
    fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            success: status.success(),
        }
    }

    const fn unknown() -> Self {
        Self {
            code: None,
            success: false,
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated"),
        }
    }
}

// ============================================================================
// BrowserProcess
// ============================================================================

/// A running browser subprocess.
pub struct BrowserProcess {
    /// OS process id.
    pid: Option<u32>,

    /// Stderr until the endpoint has been read.
    stderr: Option<ChildStderr>,

    /// Kill requests to the supervisor. Dropping it kills the process.
    kill_tx: mpsc::UnboundedSender<()>,

    /// Exit status, `None` while running.
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

impl fmt::Debug for BrowserProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserProcess")
            .field("pid", &self.pid)
            .field("exit", &*self.exit_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl BrowserProcess {
    /// Launches `binary` with `args`.
    ///
    /// Stdin and stdout are discarded; stderr is kept for
    /// [`wait_for_endpoint()`](Self::wait_for_endpoint).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessLaunchFailed`] if the process cannot start.
    pub fn spawn<I, S>(binary: &Path, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::process_launch_failed)?;

        let pid = child.id();
        let stderr = child.stderr.take();

        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = watch::channel(None);

        tokio::spawn(supervise(child, pid, kill_rx, exit_tx));

        info!(pid, binary = %binary.display(), "Browser process spawned");

        Ok(Self {
            pid,
            stderr,
            kill_tx,
            exit_rx,
        })
    }

    /// Returns the OS process id.
    #[inline]
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns the exit status if the process has ended.
    #[inline]
    #[must_use]
    pub fn exit_status(&self) -> Option<ProcessExit> {
        *self.exit_rx.borrow()
    }

    /// Reads stderr until the DevTools endpoint is announced.
    ///
    /// Stderr keeps being drained in the background afterwards.
    ///
    /// # Errors
    ///
    /// - [`Error::EndpointNotFound`] if stderr ends first
    /// - [`Error::ConnectionTimeout`] if `limit` elapses first
    /// - [`Error::Io`] on read failure
    pub async fn wait_for_endpoint(&mut self, limit: Duration) -> Result<Endpoint> {
        let stderr = self.stderr.take().ok_or(Error::EndpointNotFound)?;
        let pid = self.pid;

        let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
        let endpoint = timeout(limit, read_endpoint(stderr, pid))
            .await
            .map_err(|_| Error::connection_timeout(timeout_ms))??;

        debug!(pid, endpoint = %endpoint, "DevTools endpoint announced");
        Ok(endpoint)
    }

    /// Kills the process and waits for it to exit.
    ///
    /// Succeeds if the process already exited, and when called repeatedly
    /// or concurrently.
    ///
    /// # Errors
    ///
    /// Currently infallible.
    pub async fn kill(&self) -> Result<()> {
        self.monitor().kill().await;
        Ok(())
    }

    /// Waits for the process to exit.
    pub async fn wait(&self) -> ProcessExit {
        wait_exit(self.exit_rx.clone()).await
    }

    /// Returns a handle that observes the process without keeping it alive.
    #[must_use]
    pub fn monitor(&self) -> ProcessMonitor {
        ProcessMonitor {
            pid: self.pid,
            kill_tx: self.kill_tx.downgrade(),
            exit_rx: self.exit_rx.clone(),
        }
    }
}

// ============================================================================
// ProcessMonitor
// ============================================================================

/// Observer of a [`BrowserProcess`].
///
/// Holds no ownership: once the owning [`BrowserProcess`] is dropped the
/// process is killed regardless of monitors.
#[derive(Debug, Clone)]
pub struct ProcessMonitor {
    pid: Option<u32>,
    kill_tx: mpsc::WeakUnboundedSender<()>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

impl ProcessMonitor {
    /// Returns the OS process id.
    #[inline]
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Requests a kill and waits for the exit.
    pub async fn kill(&self) {
        if self.exit_rx.borrow().is_none() {
            match self.kill_tx.upgrade() {
                Some(kill_tx) => {
                    // Err means the supervisor already finished.
                    let _ = kill_tx.send(());
                }
                None => trace!(pid = self.pid, "Process owner gone, kill already under way"),
            }
        }
        self.wait().await;
    }

    /// Waits for the process to exit.
    pub async fn wait(&self) -> ProcessExit {
        wait_exit(self.exit_rx.clone()).await
    }
}

// ============================================================================
// Supervisor
// ============================================================================

async fn wait_exit(mut exit_rx: watch::Receiver<Option<ProcessExit>>) -> ProcessExit {
    let exit = exit_rx.wait_for(Option::is_some).await.map(|exit| *exit);
    match exit {
        Ok(exit) => exit.unwrap_or_else(ProcessExit::unknown),
        // Sender dropped without a status: the supervisor was cancelled.
        Err(_) => (*exit_rx.borrow()).unwrap_or_else(ProcessExit::unknown),
    }
}

async fn supervise(
    mut child: Child,
    pid: Option<u32>,
    mut kill_rx: mpsc::UnboundedReceiver<()>,
    exit_tx: watch::Sender<Option<ProcessExit>>,
) {
    let exit = tokio::select! {
        status = child.wait() => status,
        // A request or every owner gone.
        _ = kill_rx.recv() => terminate(&mut child, pid).await,
    };

    let exit = match exit {
        Ok(status) => ProcessExit::from_status(status),
        Err(e) => {
            warn!(pid, error = %e, "Failed to wait for browser process");
            ProcessExit::unknown()
        }
    };

    info!(pid, exit = %exit, "Browser process exited");
    exit_tx.send_replace(Some(exit));
}

async fn terminate(child: &mut Child, pid: Option<u32>) -> std::io::Result<ExitStatus> {
    debug!(pid, "Interrupting browser process");
    interrupt(child, pid);

    match timeout(KILL_GRACE_PERIOD, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            debug!(pid, "Grace period elapsed, force-killing browser process");
            if let Err(e) = child.start_kill() {
                debug!(pid, error = %e, "Failed to send kill signal");
            }
            child.wait().await
        }
    }
}

#[cfg(unix)]
fn interrupt(child: &mut Child, pid: Option<u32>) {
    let Some(raw) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: `raw` is the id of a child we have not yet reaped.
    let rc = unsafe { libc::kill(raw, libc::SIGINT) };
    if rc != 0 {
        debug!(pid, "SIGINT failed, force-killing");
        if let Err(e) = child.start_kill() {
            debug!(pid, error = %e, "Failed to send kill signal");
        }
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child, pid: Option<u32>) {
    if let Err(e) = child.start_kill() {
        debug!(pid, error = %e, "Failed to send kill signal");
    }
}

// ============================================================================
// Endpoint Discovery
// ============================================================================

async fn read_endpoint(stderr: ChildStderr, pid: Option<u32>) -> Result<Endpoint> {
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Err(Error::EndpointNotFound);
        }

        let text = String::from_utf8_lossy(&line);
        trace!(pid, line = %text.trim_end(), "browser stderr");

        if let Some(endpoint) = Endpoint::from_log_line(&text) {
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
            });
            return Ok(endpoint);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const ANNOUNCE: &str =
        r#"echo "starting up" >&2; echo "DevTools listening on ws://127.0.0.1:9/devtools/browser/x" >&2; exec sleep 30"#;

    fn spawn_script(script: &str) -> BrowserProcess {
        BrowserProcess::spawn(Path::new("/bin/sh"), ["-c", script]).expect("spawn sh")
    }

    #[tokio::test]
    async fn test_endpoint_found() {
        let mut process = spawn_script(ANNOUNCE);
        assert!(process.pid().is_some());

        let endpoint = process
            .wait_for_endpoint(Duration::from_secs(5))
            .await
            .expect("endpoint");
        assert_eq!(endpoint.url().as_str(), "ws://127.0.0.1:9/devtools/browser/x");
        assert_eq!(endpoint.port(), Some(9));

        process.kill().await.expect("kill");
    }

    #[tokio::test]
    async fn test_endpoint_not_found_when_stderr_ends() {
        let mut process = spawn_script("echo nothing here >&2");
        let err = process
            .wait_for_endpoint(Duration::from_secs(5))
            .await
            .expect_err("no endpoint");
        assert!(matches!(err, Error::EndpointNotFound));
        assert!(err.is_startup_error());
    }

    #[tokio::test]
    async fn test_endpoint_timeout() {
        let mut process = spawn_script("exec sleep 30");
        let err = process
            .wait_for_endpoint(Duration::from_millis(100))
            .await
            .expect_err("timeout");
        assert!(matches!(err, Error::ConnectionTimeout { timeout_ms: 100 }));
        process.kill().await.expect("kill");
    }

    #[tokio::test]
    async fn test_kill_twice() {
        let process = spawn_script(ANNOUNCE);
        process.kill().await.expect("first kill");
        process.kill().await.expect("second kill");
        assert!(process.exit_status().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_kill() {
        let process = spawn_script(ANNOUNCE);
        let (a, b) = tokio::join!(process.kill(), process.kill());
        a.expect("kill a");
        b.expect("kill b");
    }

    #[tokio::test]
    async fn test_kill_after_exit() {
        let process = spawn_script("exit 3");
        let exit = process.wait().await;
        assert_eq!(exit.code, Some(3));
        assert!(!exit.success);

        process.kill().await.expect("kill after exit");
        assert_eq!(process.wait().await, exit);
    }

    #[tokio::test]
    async fn test_monitor_observes_exit() {
        let process = spawn_script("exit 0");
        let monitor = process.monitor();
        let exit = monitor.wait().await;
        assert!(exit.success);
    }

    #[tokio::test]
    async fn test_wait_from_many_observers() {
        let process = spawn_script("exit 5");
        let monitor = process.monitor();

        let (a, b) = tokio::join!(process.wait(), monitor.wait());
        assert_eq!(a, b);
        assert_eq!(a.code, Some(5));
        assert_eq!(monitor.wait().await, a);
    }

    #[tokio::test]
    async fn test_drop_kills_process() {
        let process = spawn_script(ANNOUNCE);
        let monitor = process.monitor();
        drop(process);

        let exit = timeout(Duration::from_secs(10), monitor.wait())
            .await
            .expect("process killed after drop");
        assert!(!exit.success);
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let err = BrowserProcess::spawn(Path::new("/nonexistent/browser"), ["--x"])
            .expect_err("missing binary");
        assert!(matches!(err, Error::ProcessLaunchFailed { .. }));
    }
}
