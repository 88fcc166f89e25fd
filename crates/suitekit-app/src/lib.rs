//! Application-under-test process harness
//!
//! One handle per suite. The application is started in its own process group
//! with a remote-control port, and `stop` takes the whole group down so no
//! renderer or helper processes outlive the suite.

use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use suitekit_core::{HarnessConfig, HarnessError, Port, Readiness, Result, port_accepts_connections};

const REMOTE_HOST: &str = "127.0.0.1";
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct AppOptions {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Remote-control port; allocated at launch when absent
    pub remote_port: Option<Port>,
    /// How long `stop` waits after SIGTERM before escalating to SIGKILL
    pub stop_grace: Duration,
}

impl AppOptions {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            remote_port: None,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Options for the configured application binary
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` when no application path is configured
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        config
            .app_path
            .clone()
            .map(Self::new)
            .ok_or_else(|| HarnessError::Config("no application path configured".to_string()))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub const fn remote_port(mut self, port: Port) -> Self {
        self.remote_port = Some(port);
        self
    }

    #[must_use]
    pub const fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }
}

/// Where page objects reach the running application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: Port,
}

impl RemoteEndpoint {
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{self}")
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

enum ProcessState {
    Running(Child),
    Stopped(Option<ExitStatus>),
}

pub struct AppHandle {
    pid: u32,
    remote: RemoteEndpoint,
    stop_grace: Duration,
    /// Set before `stop` takes `state`, which it holds through the grace period
    stopping: AtomicBool,
    state: Mutex<ProcessState>,
}

/// Start the application described by `options`
///
/// # Errors
///
/// Returns `HarnessError::Spawn` if the program cannot be started
pub fn launch(options: AppOptions) -> Result<AppHandle> {
    AppHandle::launch(options)
}

/// Per-suite owner of the application: at most one live launch at a time
#[derive(Default)]
pub struct AppHarness {
    handle: Option<Arc<AppHandle>>,
}

impl AppHarness {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch the application, or fail if this harness already has a live one
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::AlreadyLaunched` while a previous launch is
    /// still running, otherwise the launch error
    pub fn launch(&mut self, options: AppOptions) -> Result<Arc<AppHandle>> {
        if self.is_running() {
            return Err(HarnessError::AlreadyLaunched);
        }
        // Reap whatever is left of an application that exited on its own.
        self.stop()?;
        let handle = Arc::new(AppHandle::launch(options)?);
        self.handle = Some(Arc::clone(&handle));
        Ok(handle)
    }

    #[must_use]
    pub fn handle(&self) -> Option<&Arc<AppHandle>> {
        self.handle.as_ref()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| handle.is_running())
    }

    /// Stop the launched application; a no-op when nothing was launched
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` if waiting on the child fails
    pub fn stop(&self) -> Result<()> {
        self.handle.as_ref().map_or(Ok(()), |handle| handle.stop())
    }
}

impl AppHandle {
    /// Start the application described by `options`
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Spawn` if the program cannot be started and
    /// `HarnessError::Io` if no remote port can be allocated
    pub fn launch(options: AppOptions) -> Result<Self> {
        let port = match options.remote_port {
            Some(port) => port,
            None => Port::allocate()?,
        };

        let mut command = Command::new(&options.program);
        command
            .args(&options.args)
            .arg(format!("--remote-debugging-port={port}"))
            .envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command
            .spawn()
            .map_err(|e| HarnessError::spawn(options.program.display().to_string(), e))?;
        let pid = child.id();
        tracing::info!(pid, %port, program = %options.program.display(), "launched application");

        Ok(Self {
            pid,
            remote: RemoteEndpoint {
                host: REMOTE_HOST.to_string(),
                port,
            },
            stop_grace: options.stop_grace,
            stopping: AtomicBool::new(false),
            state: Mutex::new(ProcessState::Running(child)),
        })
    }

    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub const fn remote(&self) -> &RemoteEndpoint {
        &self.remote
    }

    /// Non-blocking liveness check
    ///
    /// A handle with a stop in progress reports not running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        loop {
            if self.stopping.load(Ordering::Acquire) {
                return false;
            }
            let mut state = match self.state.try_lock() {
                Ok(state) => state,
                Err(TryLockError::Poisoned(e)) => e.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    thread::yield_now();
                    continue;
                }
            };
            return match &mut *state {
                ProcessState::Running(child) => matches!(child.try_wait(), Ok(None)),
                ProcessState::Stopped(_) => false,
            };
        }
    }

    /// Exit status once the application has been stopped
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match &*self.lock() {
            ProcessState::Stopped(status) => *status,
            ProcessState::Running(_) => None,
        }
    }

    /// Poll until the remote-control port accepts connections
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::NotRunning` if the application exits while
    /// waiting and `HarnessError::Timeout` if the port never opens
    pub fn wait_ready(&self, readiness: Readiness) -> Result<usize> {
        let mut exited = false;
        let result = readiness.wait_until(&format!("application remote port {}", self.remote.port), || {
            if !self.is_running() {
                exited = true;
                return true;
            }
            port_accepts_connections(&self.remote.host, self.remote.port)
        });
        if exited { Err(HarnessError::NotRunning) } else { result }
    }

    /// Terminate the application and every process in its group
    ///
    /// Sends SIGTERM to the group, waits up to the grace period, then sends
    /// SIGKILL. The child is always reaped. Stopping a stopped handle is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` if waiting on the child fails
    pub fn stop(&self) -> Result<()> {
        self.stopping.store(true, Ordering::Release);
        let mut state = self.lock();
        let ProcessState::Running(child) = &mut *state else {
            tracing::debug!(pid = self.pid, "application already stopped");
            return Ok(());
        };

        signal_group(self.pid, child, Signal::Terminate);
        // No deadline when the grace period does not fit in an Instant.
        let deadline = Instant::now().checked_add(self.stop_grace);
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                tracing::warn!(pid = self.pid, grace = ?self.stop_grace, "application ignored SIGTERM, killing");
                signal_group(self.pid, child, Signal::Kill);
                break child.wait()?;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        };
        // Helpers that outlived the group leader still share its group id.
        signal_group(self.pid, child, Signal::Kill);

        tracing::info!(pid = self.pid, ?status, "application stopped");
        *state = ProcessState::Stopped(Some(status));
        Ok(())
    }

    /// Interactive inspection against the live handle
    ///
    /// Reads commands from `input` until `continue`, `exit` or end of input:
    /// `status` prints liveness, `endpoint` prints the remote-control address.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` on read or write failure
    pub fn debug<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<()> {
        tracing::info!(pid = self.pid, remote = %self.remote, "entering debug mode");
        writeln!(output, "debugging application pid {} at {}", self.pid, self.remote.url())?;
        for line in input.lines() {
            match line?.trim() {
                "" => {}
                "continue" | "exit" => break,
                "status" => {
                    let status = if self.is_running() { "running" } else { "stopped" };
                    writeln!(output, "{status}")?;
                }
                "endpoint" => writeln!(output, "{}", self.remote)?,
                other => writeln!(output, "unknown command: {other}")?,
            }
        }
        tracing::info!(pid = self.pid, "leaving debug mode");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ProcessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AppHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!(pid = self.pid, error = %e, "failed to stop application on drop");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, _child: &mut Child, signal: Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal as NixSignal};
    use nix::unistd::Pid;

    let nix_signal = match signal {
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    #[allow(clippy::cast_possible_wrap)]
    let group = Pid::from_raw(pid as i32);
    match signal::killpg(group, nix_signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, ?signal, error = %e, "failed to signal process group"),
    }
}

#[cfg(not(unix))]
fn signal_group(pid: u32, child: &mut Child, _signal: Signal) {
    if let Err(e) = child.kill() {
        tracing::debug!(pid, error = %e, "kill failed");
    }
}
