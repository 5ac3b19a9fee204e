use crate::errors::SessionError;
use crate::utils::shell::heredoc_write_command;
use serde::Serialize;

/// Result of one remote invocation. A non-zero exit code is still `Ran`;
/// `TransportFailure` means the command could not be carried out at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecOutcome {
    Ran {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    TransportFailure {
        message: String,
    },
}

/// Flat view of an [`ExecOutcome`] using the legacy convention: a transport
/// failure becomes empty stdout, the error text as stderr, and exit code 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub const TRANSPORT_FAILURE_EXIT_CODE: i32 = 1;

impl ExecOutcome {
    pub fn ran(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        ExecOutcome::Ran {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn transport_failure(message: impl Into<String>) -> Self {
        ExecOutcome::TransportFailure {
            message: message.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, ExecOutcome::Ran { exit_code: 0, .. })
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self, ExecOutcome::TransportFailure { .. })
    }

    /// Error text for logging when the invocation did not succeed.
    pub fn failure_text(&self) -> &str {
        match self {
            ExecOutcome::Ran { stderr, .. } => stderr,
            ExecOutcome::TransportFailure { message } => message,
        }
    }

    pub fn into_result(self) -> ExecutionResult {
        match self {
            ExecOutcome::Ran {
                stdout,
                stderr,
                exit_code,
            } => ExecutionResult {
                stdout,
                stderr,
                exit_code,
            },
            ExecOutcome::TransportFailure { message } => ExecutionResult {
                stdout: String::new(),
                stderr: message,
                exit_code: TRANSPORT_FAILURE_EXIT_CODE,
            },
        }
    }
}

/// One live remote session. Blocking: callers run it off the async runtime.
pub trait RemoteShell: Send {
    /// Runs `command` to completion and returns its trimmed output.
    fn run(&mut self, command: &str) -> ExecOutcome;

    /// Writes `content` plus a trailing newline to `path`. The default goes
    /// through [`RemoteShell::run`] with a quoted heredoc.
    fn write_file(&mut self, path: &str, content: &str) -> ExecOutcome {
        self.run(&heredoc_write_command(path, content))
    }

    /// Releases the connection. Safe to call more than once.
    fn close(&mut self);
}

pub trait Connector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn RemoteShell>, SessionError>;
}
