use super::runner::ExitStatus;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran to completion with a failing status.
    #[error("{message}")]
    Failed {
        command: String,
        status: ExitStatus,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The shared command lock could not be acquired.
    #[error(transparent)]
    Lock(#[from] crate::sync::LockError),

    #[error("Internal error: {message}")]
    InternalError { message: String },

    #[error("Mock expectation not met: {0}")]
    MockExpectationNotMet(String),
}

impl ProcessError {
    /// Exit code of a command that ran and failed, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Failed { status, .. } => status.code(),
            _ => None,
        }
    }
}

/// Map an error from `spawn()` onto the matching variant.
pub fn map_spawn_error(error: std::io::Error, command: &str) -> ProcessError {
    if error.kind() == std::io::ErrorKind::NotFound {
        ProcessError::CommandNotFound(command.to_string())
    } else {
        ProcessError::SpawnFailed {
            command: command.to_string(),
            source: error,
        }
    }
}

/// Build the terminal error for a failed invocation.
///
/// Priority: captured stderr text, then the spawn error, then a synthetic
/// `unknown error, code:N` message.
pub fn resolve_failure(
    command: &str,
    stderr: &[u8],
    spawn_error: Option<std::io::Error>,
    status: ExitStatus,
) -> ProcessError {
    if !stderr.is_empty() {
        return ProcessError::Failed {
            command: command.to_string(),
            status,
            message: String::from_utf8_lossy(stderr).trim_end().to_string(),
        };
    }

    if let Some(error) = spawn_error {
        return map_spawn_error(error, command);
    }

    let message = match status {
        ExitStatus::Signal(signal) => format!("unknown error, signal:{signal}"),
        other => format!("unknown error, code:{}", other.code().unwrap_or(-1)),
    };
    ProcessError::Failed {
        command: command.to_string(),
        status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_takes_priority() {
        let spawn = std::io::Error::other("spawn broke");
        let err = resolve_failure("git log", b"fatal: boom\n", Some(spawn), ExitStatus::Error(7));
        assert_eq!(err.to_string(), "fatal: boom");
        assert_eq!(err.exit_code(), Some(7));
    }

    #[test]
    fn test_spawn_error_used_without_stderr() {
        let spawn = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = resolve_failure("git", b"", Some(spawn), ExitStatus::Error(-1));
        match err {
            ProcessError::SpawnFailed { command, source } => {
                assert_eq!(command, "git");
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("Expected SpawnFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_executable_maps_to_command_not_found() {
        let spawn = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = resolve_failure("gti", b"", Some(spawn), ExitStatus::Error(-1));
        assert!(matches!(err, ProcessError::CommandNotFound(ref cmd) if cmd == "gti"));
    }

    #[test]
    fn test_generic_message_uses_exit_code() {
        let err = resolve_failure("git", b"", None, ExitStatus::Error(128));
        assert_eq!(err.to_string(), "unknown error, code:128");
    }

    #[test]
    fn test_generic_message_for_signal() {
        let err = resolve_failure("git", b"", None, ExitStatus::Signal(9));
        assert_eq!(err.to_string(), "unknown error, signal:9");
        assert_eq!(err.exit_code(), None);
    }
}
