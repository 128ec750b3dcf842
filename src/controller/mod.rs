//! Process controllers: the supervisor interface used to restart targets.
//!
//! The monitor only ever calls [`ProcessController::restart`] (and
//! [`ProcessController::heap_dump`] on memory-leak signatures). Concrete
//! controllers shell out with argument vectors, never through a shell.

use async_trait::async_trait;

pub mod command;
pub mod systemd;

pub use command::CommandController;
pub use systemd::SystemdController;

use crate::config::{ControllerKind, RecoveryConfig};

/// Errors produced by process controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The process name contains disallowed characters.
    #[error("invalid process name: {0}")]
    InvalidName(String),
    /// The controller command could not be started.
    #[error("failed to spawn {program}: {reason}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// OS error text.
        reason: String,
    },
    /// The controller command ran and reported failure.
    #[error("{program} exited with code {code:?}: {stderr}")]
    Failed {
        /// Program that failed.
        program: String,
        /// Exit code, if any.
        code: Option<i32>,
        /// Trimmed stderr.
        stderr: String,
    },
    /// The operation exceeded its time budget.
    #[error("operation timed out after {seconds}s")]
    Timeout {
        /// Budget in seconds.
        seconds: u64,
    },
    /// The controller does not implement the operation.
    #[error("operation not supported by {0} controller")]
    Unsupported(&'static str),
}

/// External supervisor capable of restarting a named process.
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// Restart the named process. Returns the controller's output on success.
    async fn restart(&self, name: &str) -> Result<String, ControllerError>;

    /// Capture a heap dump of the named process.
    async fn heap_dump(&self, _name: &str) -> Result<String, ControllerError> {
        Err(ControllerError::Unsupported(self.kind()))
    }

    /// Short identifier for logs.
    fn kind(&self) -> &'static str;
}

/// Build the controller selected in configuration.
pub fn from_config(config: &RecoveryConfig) -> Box<dyn ProcessController> {
    match config.controller {
        ControllerKind::Command => Box::new(CommandController::new(
            config.restart_command.clone(),
            config.heap_dump_command.clone(),
        )),
        ControllerKind::Systemd => Box::new(SystemdController::new()),
    }
}

/// Reject process names that could be mistaken for flags or paths.
///
/// # Errors
///
/// Returns [`ControllerError::InvalidName`] for empty, over-long, flag-like,
/// path-like, or control-character names.
pub fn validate_process_name(name: &str) -> Result<(), ControllerError> {
    if name.trim().is_empty()
        || name.starts_with('-')
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.chars().any(|c| c.is_control())
        || name.len() > 128
    {
        return Err(ControllerError::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// Run a program to completion and map its exit status.
pub(crate) async fn run_program(program: &str, args: &[String]) -> Result<String, ControllerError> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ControllerError::Spawn {
            program: program.to_owned(),
            reason: e.to_string(),
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    } else {
        Err(ControllerError::Failed {
            program: program.to_owned(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}
