//! Error taxonomy for shipwright operations.
//!
//! Operations return `anyhow::Result` and attach context freely. The variants
//! here are the failures the entry point needs to recognise to pick an exit
//! code, so they are raised as typed values and recovered with
//! [`exit_code`].

use std::path::PathBuf;

/// Typed orchestration failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown command '{name}'. Run 'shipwright help' to list commands.")]
    InvalidCommand { name: String },

    #[error("{what} not found. Run '{remediation}' first.")]
    MissingPrecondition { what: String, remediation: String },

    #[error("{action} aborted by user")]
    UserAborted { action: String },

    #[error("'{program}' failed (exit code {code})")]
    SubprocessFailure { program: String, code: i32 },

    #[error("failed to remove {}: {reason}", .path.display())]
    CleanupFailure { path: PathBuf, reason: String },

    #[error("interrupted by {signal}")]
    Interrupted { signal: Signal },

    #[error("invalid {key}={value:?}: {reason}")]
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("'{program}' not found in PATH. Is it installed?")]
    ToolNotFound { program: String },
}

impl Error {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::SubprocessFailure { code, .. } => *code,
            Error::Interrupted { signal } => 128 + signal.number(),
            Error::InvalidCommand { .. } => 2,
            _ => 1,
        }
    }
}

/// Termination signals the orchestrator intercepts while a tool runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
    Hangup,
}

impl Signal {
    pub fn number(self) -> i32 {
        match self {
            Signal::Hangup => 1,
            Signal::Interrupt => 2,
            Signal::Terminate => 15,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Hangup => "SIGHUP",
        };
        f.write_str(name)
    }
}

/// Exit code for an error chain.
///
/// Looks through the chain for a typed [`Error`]; anything else maps to 1.
/// Codes outside `1..=255` collapse to 1 so a failure never reads as success.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map(Error::exit_code)
        .unwrap_or(1);
    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}
