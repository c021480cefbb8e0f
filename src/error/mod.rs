use std::fmt::Display;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

use crate::config::ConfigError;
use crate::subprocess::ProcessError;
use crate::sync::LockError;
use crate::transport::TransportError;

/// The unified error type surfaced to callers of the git layer
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Lock error: {message}")]
    Lock {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Execution error: {message}")]
    Execution {
        code: u16,
        message: String,
        command: Option<String>,
        exit_code: Option<i32>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Transport error: {message}")]
    Transport {
        code: u16,
        message: String,
        trace: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl BridgeError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn lock_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Lock {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create an execution error with default code
    pub fn execution(message: impl Into<String>) -> Self {
        Self::execution_with_code(ErrorCode::EXEC_GENERIC, message, None)
    }

    /// Create an execution error with specific code and command
    pub fn execution_with_code(
        code: u16,
        message: impl Into<String>,
        command: Option<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            command,
            exit_code: None,
            source: None,
        }
    }

    pub fn transport_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            code,
            message: message.into(),
            trace: None,
            source: None,
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Lock { source: src, .. }
            | Self::Execution { source: src, .. }
            | Self::Transport { source: src, .. }
            | Self::Other { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Lock { message, .. }
            | Self::Execution { message, .. }
            | Self::Transport { message, .. }
            | Self::Other { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
        }
        self
    }

    /// Set the exit code for an execution error
    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        if let Self::Execution {
            exit_code: ref mut ec,
            ..
        } = self
        {
            *ec = Some(exit_code);
        }
        self
    }

    /// Get the process exit code the CLI should use for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Lock { .. } => 3,
            Self::Execution { .. } => 5,
            Self::Transport { .. } => 6,
            Self::Other { .. } => 1,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Lock { code, .. }
            | Self::Execution { code, .. }
            | Self::Transport { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// Bare message without the code prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Config { message, .. }
            | Self::Lock { message, .. }
            | Self::Execution { message, .. }
            | Self::Transport { message, .. }
            | Self::Other { message, .. } => message,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::Lock { message, .. } => format!("Could not run command: {}", message),
            Self::Execution {
                message, command, ..
            } => {
                if let Some(cmd) = command {
                    format!("Command '{}' failed: {}", cmd, message)
                } else {
                    format!("Execution error: {}", message)
                }
            }
            Self::Transport { message, .. } => message.clone(),
            Self::Other { message, .. } => message.clone(),
        }
    }

    /// Get a developer-friendly error message including the remote trace
    pub fn developer_message(&self) -> String {
        match self {
            Self::Transport {
                trace: Some(trace), ..
            } => format!("{}\n{}", self, trace),
            _ => format!("{:#}", self),
        }
    }

    /// Lock timeouts are the only failures worth retrying as-is.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Lock { code, .. } if *code == ErrorCode::LOCK_TIMEOUT)
    }
}

impl From<LockError> for BridgeError {
    fn from(err: LockError) -> Self {
        let code = match err {
            LockError::Timeout(_) => ErrorCode::LOCK_TIMEOUT,
            LockError::Abandoned => ErrorCode::LOCK_ABANDONED,
        };
        BridgeError::lock_with_code(code, err.to_string())
    }
}

impl From<ProcessError> for BridgeError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Lock(lock) => lock.into(),
            ProcessError::CommandNotFound(ref command) => BridgeError::execution_with_code(
                ErrorCode::EXEC_COMMAND_NOT_FOUND,
                err.to_string(),
                Some(command.clone()),
            ),
            ProcessError::SpawnFailed { ref command, .. } => {
                let command = command.clone();
                BridgeError::execution_with_code(
                    ErrorCode::EXEC_SPAWN_FAILED,
                    err.to_string(),
                    Some(command),
                )
                .with_source(err)
            }
            ProcessError::Failed {
                ref command,
                status,
                ref message,
            } => {
                let code = if status.code().is_some() {
                    ErrorCode::EXEC_SUBPROCESS_FAILED
                } else {
                    ErrorCode::EXEC_SIGNAL_RECEIVED
                };
                let error =
                    BridgeError::execution_with_code(code, message.clone(), Some(command.clone()));
                match status.code() {
                    Some(exit) => error.with_exit_code(exit),
                    None => error,
                }
            }
            ProcessError::Io(_) => BridgeError::execution_with_code(
                ErrorCode::EXEC_OUTPUT_ERROR,
                err.to_string(),
                None,
            )
            .with_source(err),
            ProcessError::InternalError { .. } => BridgeError::execution_with_code(
                ErrorCode::EXEC_ENVIRONMENT_ERROR,
                err.to_string(),
                None,
            ),
            ProcessError::MockExpectationNotMet(_) => BridgeError::execution(err.to_string()),
        }
    }
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        match err {
            // A lock failure on the host stays a lock failure for the caller.
            TransportError::Remote {
                message,
                code: Some(code),
                ..
            } if (ErrorCode::LOCK_GENERIC..ErrorCode::LOCK_GENERIC + 1000).contains(&code) => {
                BridgeError::lock_with_code(code, message)
            }
            TransportError::Remote { message, trace, .. } => BridgeError::Transport {
                code: ErrorCode::TRANSPORT_REMOTE_ERROR,
                message,
                trace,
                source: None,
            },
            TransportError::PortClosed => {
                BridgeError::transport_with_code(ErrorCode::TRANSPORT_CLOSED, err.to_string())
            }
            TransportError::StreamAlreadyClaimed(_) | TransportError::RendezvousDropped(_) => {
                BridgeError::transport_with_code(ErrorCode::TRANSPORT_RENDEZVOUS, err.to_string())
            }
            TransportError::Codec(_) => {
                BridgeError::transport_with_code(ErrorCode::TRANSPORT_CODEC, err.to_string())
                    .with_source(err)
            }
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::NotFound(_) => ErrorCode::CONFIG_NOT_FOUND,
            ConfigError::Parse { .. } => ErrorCode::CONFIG_INVALID_TOML,
            ConfigError::InvalidValue { .. } => ErrorCode::CONFIG_INVALID_VALUE,
            ConfigError::Read { .. } | ConfigError::NoConfigDir => ErrorCode::CONFIG_PATH_ERROR,
        };
        BridgeError::config_with_code(code, err.to_string()).with_source(err)
    }
}

/// Type alias for Results using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::{resolve_failure, ExitStatus};
    use std::time::Duration;

    #[test]
    fn test_error_display_includes_code() {
        let err = BridgeError::config("missing git_program");
        assert_eq!(
            err.to_string(),
            "[E1000] Configuration error: missing git_program"
        );
        assert_eq!(err.code(), ErrorCode::CONFIG_GENERIC);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_with_context_appends() {
        let err = BridgeError::other("log failed").with_context("repository /tmp/x");
        assert_eq!(err.message(), "log failed: repository /tmp/x");
    }

    #[test]
    fn test_failed_process_keeps_stderr_message() {
        let process = resolve_failure(
            "git log",
            b"fatal: not a git repository\n",
            None,
            ExitStatus::Error(128),
        );
        let err = BridgeError::from(process);

        match &err {
            BridgeError::Execution {
                code,
                command,
                exit_code,
                ..
            } => {
                assert_eq!(*code, ErrorCode::EXEC_SUBPROCESS_FAILED);
                assert_eq!(command.as_deref(), Some("git log"));
                assert_eq!(*exit_code, Some(128));
            }
            other => panic!("Expected Execution, got {other:?}"),
        }
        assert_eq!(err.message(), "fatal: not a git repository");
        assert_eq!(
            err.user_message(),
            "Command 'git log' failed: fatal: not a git repository"
        );
    }

    #[test]
    fn test_command_not_found_code() {
        let err = BridgeError::from(ProcessError::CommandNotFound("gti".to_string()));
        assert_eq!(err.code(), ErrorCode::EXEC_COMMAND_NOT_FOUND);
    }

    #[test]
    fn test_lock_timeout_is_recoverable() {
        let err = BridgeError::from(ProcessError::Lock(LockError::Timeout(
            Duration::from_millis(100),
        )));
        assert_eq!(err.code(), ErrorCode::LOCK_TIMEOUT);
        assert!(err.is_recoverable());
        assert!(err.message().contains("Mutex acquire timeout"));

        assert!(!BridgeError::execution("boom").is_recoverable());
    }

    #[test]
    fn test_remote_error_keeps_trace() {
        let err = BridgeError::from(TransportError::Remote {
            message: "fatal: bad revision".to_string(),
            trace: Some("caused by: exit 128".to_string()),
            code: Some(ErrorCode::EXEC_SUBPROCESS_FAILED),
        });
        assert_eq!(err.code(), ErrorCode::TRANSPORT_REMOTE_ERROR);
        assert_eq!(err.user_message(), "fatal: bad revision");
        assert!(err.developer_message().ends_with("caused by: exit 128"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_remote_lock_timeout_stays_recoverable() {
        let err = BridgeError::from(TransportError::Remote {
            message: "Mutex acquire timeout after 50ms".to_string(),
            trace: None,
            code: Some(ErrorCode::LOCK_TIMEOUT),
        });
        assert_eq!(err.code(), ErrorCode::LOCK_TIMEOUT);
        assert!(err.is_recoverable());
        assert_eq!(err.message(), "Mutex acquire timeout after 50ms");
    }
}
