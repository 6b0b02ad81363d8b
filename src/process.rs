//! Centralized execution of external tools.
//!
//! Every collaborator (cargo, docker, act, sudo) is described as a [`Cmd`] and
//! handed to a [`Runner`]. Operations never spawn processes themselves, which
//! keeps the host boundary in one place and lets tests record invocations
//! instead of running them.

use anyhow::{Context, Result};
use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::signal::unix::{signal, Signal as Listener, SignalKind};
use tracing::{debug, warn};

use crate::error::{Error, Signal};

/// Builder for an external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.envs
            .push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Set the working directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    pub fn get_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Run with inherited stdio and wait for the tool to exit.
    ///
    /// SIGINT, SIGTERM and SIGHUP are intercepted while the child runs: the
    /// signal is passed on to the child and [`Error::Interrupted`] is
    /// returned, so callers unwind normally and their guards get to clean up.
    pub fn status(&self) -> Result<ExitStatus> {
        Interrupts::install()?.wait(self)
    }

    /// Run with inherited stdio and wait, whatever signals arrive meanwhile.
    ///
    /// Only safe inside an [`Interrupts`] scope; outside one a signal still
    /// terminates the process with its default action.
    pub fn status_to_completion(&self) -> Result<ExitStatus> {
        let mut command = std::process::Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(ref dir) = self.current_dir {
            command.current_dir(dir);
        }
        debug!(command = %self, "spawning, not interruptible");
        command
            .status()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))
    }

    fn tokio_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(ref dir) = self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// How long a tool gets to exit after a forwarded signal before SIGKILL.
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// Listeners for SIGINT, SIGTERM and SIGHUP held for the length of a scope.
///
/// While an `Interrupts` is alive those signals no longer terminate the
/// process. They are recorded instead, and the scope decides when to stop:
/// [`Interrupts::pending`] reports one that already arrived,
/// [`Interrupts::wait`] runs a tool and stops it when one arrives.
pub struct Interrupts {
    runtime: Runtime,
    listeners: Listeners,
    received: Option<Signal>,
}

struct Listeners {
    interrupt: Listener,
    terminate: Listener,
    hangup: Listener,
}

impl Listeners {
    async fn next(&mut self) -> Signal {
        tokio::select! {
            biased;
            _ = self.interrupt.recv() => Signal::Interrupt,
            _ = self.terminate.recv() => Signal::Terminate,
            _ = self.hangup.recv() => Signal::Hangup,
        }
    }
}

impl Interrupts {
    pub fn install() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start runtime for signal handling")?;
        let listeners = {
            let _context = runtime.enter();
            Listeners {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
                hangup: signal(SignalKind::hangup())?,
            }
        };
        Ok(Self {
            runtime,
            listeners,
            received: None,
        })
    }

    /// The first signal seen in this scope, checking for new arrivals.
    pub fn pending(&mut self) -> Option<Signal> {
        if self.received.is_none() {
            let listeners = &mut self.listeners;
            self.received = self.runtime.block_on(async {
                // Lets the driver pick up signals delivered before this call.
                tokio::task::yield_now().await;
                tokio::select! {
                    biased;
                    signal = listeners.next() => Some(signal),
                    _ = std::future::ready(()) => None,
                }
            });
        }
        self.received
    }

    /// Run `cmd` with inherited stdio until it exits or a signal arrives.
    ///
    /// A signal is forwarded to the child, which gets [`STOP_GRACE`] to exit
    /// before it is killed. The result is then [`Error::Interrupted`]. If a
    /// signal is already pending the tool is not started.
    pub fn wait(&mut self, cmd: &Cmd) -> Result<ExitStatus> {
        if let Some(signal) = self.pending() {
            debug!(command = %cmd, %signal, "not starting tool, already interrupted");
            return Err(Error::Interrupted { signal }.into());
        }
        self.runtime
            .block_on(wait_for(cmd, &mut self.listeners, &mut self.received))
    }
}

async fn wait_for(
    cmd: &Cmd,
    listeners: &mut Listeners,
    received: &mut Option<Signal>,
) -> Result<ExitStatus> {
    debug!(command = %cmd, "spawning");
    let mut child = cmd
        .tokio_command()
        .spawn()
        .with_context(|| format!("Failed to execute '{}'. Is it installed?", cmd.program))?;

    let signal = tokio::select! {
        status = child.wait() => {
            return status.with_context(|| format!("Failed to wait for '{}'", cmd.program));
        }
        signal = listeners.next() => signal,
    };
    *received = Some(signal);

    warn!(program = %cmd.program, %signal, "stopping tool after signal");
    forward(&child, signal);
    let status = match tokio::time::timeout(STOP_GRACE, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(program = %cmd.program, %signal, "tool still running after grace period, killing it");
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "child already gone");
            }
            child.wait().await
        }
    };
    match status {
        Ok(status) => debug!(program = %cmd.program, %status, "stopped"),
        Err(e) => warn!(program = %cmd.program, error = %e, "lost track of stopped tool"),
    }
    Err(Error::Interrupted { signal }.into())
}

/// Send `signal` to the child so it can shut down its own work.
fn forward(child: &tokio::process::Child, signal: Signal) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    if unsafe { libc::kill(pid, signal.number()) } != 0 {
        debug!(pid, error = %std::io::Error::last_os_error(), "could not forward signal");
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = vec![self.program.as_str()];
        words.extend(self.args.iter().map(String::as_str));
        f.write_str(&shell_words::join(words))
    }
}

/// Executes tool invocations on behalf of the operations.
///
/// A non-zero status is not an error at this level; see [`ensure_success`].
pub trait Runner {
    /// Run `cmd` to completion, stopping it if a termination signal arrives.
    fn run(&self, cmd: &Cmd) -> Result<ExitStatus>;

    /// Like [`Runner::run`], but signals are taken from an enclosing scope.
    fn run_within(&self, cmd: &Cmd, _interrupts: &mut Interrupts) -> Result<ExitStatus> {
        self.run(cmd)
    }

    /// Run `cmd` to completion even if a signal arrives meanwhile.
    ///
    /// Used for teardown, which must not be cut short by the very signal that
    /// triggered it.
    fn run_to_completion(&self, cmd: &Cmd) -> Result<ExitStatus> {
        self.run(cmd)
    }
}

/// Runs tools on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn announce(cmd: &Cmd) -> Result<()> {
        if which::which(cmd.program()).is_err() {
            return Err(Error::ToolNotFound {
                program: cmd.program().to_string(),
            }
            .into());
        }
        println!("+ {}", cmd);
        Ok(())
    }
}

impl Runner for SystemRunner {
    fn run(&self, cmd: &Cmd) -> Result<ExitStatus> {
        Self::announce(cmd)?;
        cmd.status()
    }

    fn run_within(&self, cmd: &Cmd, interrupts: &mut Interrupts) -> Result<ExitStatus> {
        Self::announce(cmd)?;
        interrupts.wait(cmd)
    }

    fn run_to_completion(&self, cmd: &Cmd) -> Result<ExitStatus> {
        Self::announce(cmd)?;
        cmd.status_to_completion()
    }
}

/// Run `cmd` and turn a non-zero exit into [`Error::SubprocessFailure`].
pub fn run_checked(runner: &dyn Runner, cmd: &Cmd) -> Result<()> {
    let status = runner.run(cmd)?;
    ensure_success(cmd.program(), status)
}

/// [`run_checked`] without interruption, for teardown.
pub fn run_to_completion_checked(runner: &dyn Runner, cmd: &Cmd) -> Result<()> {
    let status = runner.run_to_completion(cmd)?;
    ensure_success(cmd.program(), status)
}

/// Map an exit status to the orchestrator's error taxonomy.
///
/// The tool's own code is preserved; a signal death reports `128 + signal`.
pub fn ensure_success(program: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    let code = status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1);
    Err(Error::SubprocessFailure {
        program: program.to_string(),
        code,
    }
    .into())
}

/// How privileged filesystem changes are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Through `sudo` via the runner.
    Sudo,
    /// Directly with the current user's permissions.
    Direct,
}

impl Privilege {
    /// `sudo` when it is on PATH, direct otherwise (e.g. root in a container).
    pub fn detect() -> Self {
        if which::which("sudo").is_ok() {
            Privilege::Sudo
        } else {
            Privilege::Direct
        }
    }
}
