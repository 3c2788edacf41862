//! Bounded-lifetime subprocess execution.
//!
//! One contract for every child the harness starts (binary preflight, agent
//! run, validation steps): stdio goes straight to files or the null device, a
//! timeout escalates SIGTERM then SIGKILL, and a child that runs and exits
//! non-zero is a normal result. Only a failure to spawn is an `Err`.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::lifecycle::{Escalation, Lifecycle};
use crate::core::types::{CommandRunResult, CommandSpec};

/// Time a child gets to exit after SIGTERM before it is SIGKILLed.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Destination for one child output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    Discard,
    /// Write to `path`, appending when `append` is set and truncating otherwise.
    File { path: PathBuf, append: bool },
}

impl OutputSink {
    pub fn file(path: impl Into<PathBuf>, append: bool) -> Self {
        OutputSink::File {
            path: path.into(),
            append,
        }
    }

    fn open(&self) -> Result<Stdio> {
        match self {
            OutputSink::Discard => Ok(Stdio::null()),
            OutputSink::File { path, append } => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("create log dir {}", parent.display()))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(*append)
                    .truncate(!*append)
                    .open(path)
                    .with_context(|| format!("open log {}", path.display()))?;
                Ok(Stdio::from(file))
            }
        }
    }
}

/// Parameters for one supervised child process.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub spec: CommandSpec,
    pub stdout: OutputSink,
    pub stderr: OutputSink,
    /// Wall-clock budget before SIGTERM.
    pub timeout: Duration,
    /// Wait between SIGTERM and SIGKILL.
    pub kill_grace: Duration,
}

impl ProcessRequest {
    /// Request with both streams discarded and the default kill grace.
    pub fn new(spec: CommandSpec, timeout: Duration) -> Self {
        Self {
            spec,
            stdout: OutputSink::Discard,
            stderr: OutputSink::Discard,
            timeout,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Send stdout and stderr to the given files.
    pub fn with_logs(mut self, stdout: PathBuf, stderr: PathBuf, append: bool) -> Self {
        self.stdout = OutputSink::file(stdout, append);
        self.stderr = OutputSink::file(stderr, append);
        self
    }

    pub fn with_kill_grace(mut self, kill_grace: Duration) -> Self {
        self.kill_grace = kill_grace;
        self
    }
}

/// Run a command to completion under the timeout/kill contract.
///
/// `CommandSpec::env` overrides are applied to the child's copy of the
/// inherited environment. Duration runs from spawn until the child is reaped.
#[instrument(skip_all, fields(command = %request.spec.command, timeout_secs = request.timeout.as_secs()))]
pub fn run_process(request: &ProcessRequest) -> Result<CommandRunResult> {
    let spec = &request.spec;
    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(request.stdout.open()?)
        .stderr(request.stderr.open()?);
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, command = %spec.command, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn command {}", spec.command));
        }
    };

    let mut state = Lifecycle::Running;
    let status = match child.wait_timeout(request.timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "command timed out, terminating"
            );
            let (next, action) = state.on_timeout();
            state = next;
            escalate(&mut child, action)?;
            match child
                .wait_timeout(request.kill_grace)
                .context("wait for command after SIGTERM")?
            {
                Some(status) => status,
                None => {
                    warn!(
                        grace_ms = request.kill_grace.as_millis() as u64,
                        "command ignored SIGTERM, killing"
                    );
                    let (next, action) = state.on_grace_expired();
                    state = next;
                    escalate(&mut child, action)?;
                    child.wait().context("wait command after kill")?
                }
            }
        }
    };
    let duration = started.elapsed();

    let result = CommandRunResult {
        exit_code: status.code(),
        signal: signal_name(&status),
        timed_out: state.timed_out(),
        duration_ms: duration.as_millis() as u64,
    };
    debug!(
        exit_code = ?result.exit_code,
        signal = ?result.signal,
        timed_out = result.timed_out,
        duration_ms = result.duration_ms,
        "command finished"
    );
    Ok(result)
}

fn escalate(child: &mut Child, action: Option<Escalation>) -> Result<()> {
    match action {
        Some(Escalation::Terminate) => send_sigterm(child),
        Some(Escalation::Kill) => child.kill().context("kill command"),
        None => Ok(()),
    }
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child) -> Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let pid = i32::try_from(child.id()).context("child pid out of range")?;
    kill(Pid::from_raw(pid), Signal::SIGTERM).context("send SIGTERM")
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

#[cfg(unix)]
fn signal_name(status: &ExitStatus) -> Option<String> {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    let signal = status.signal()?;
    Some(
        Signal::try_from(signal)
            .map(|known| known.as_str().to_string())
            .unwrap_or_else(|_| format!("signal {signal}")),
    )
}

#[cfg(not(unix))]
fn signal_name(_status: &ExitStatus) -> Option<String> {
    None
}
