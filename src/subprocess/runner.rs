use futures::stream::Stream;
use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;

use super::error::{resolve_failure, ProcessError};

#[derive(Debug, Clone, Default)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, env: &HashMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn in_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// Program and arguments joined for logs and error messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            ExitStatus::Signal(_) => None,
        }
    }
}

pub type LineItem = Result<String, ProcessError>;

/// Lazy, single-pass sequence of stdout lines.
///
/// A failing command yields every line it printed, then exactly one `Err`
/// describing the failure, then ends.
pub type LineStream = Pin<Box<dyn Stream<Item = LineItem> + Send>>;

pub trait ProcessRunner: Send + Sync {
    /// Stream the stdout lines of `command`.
    ///
    /// Nothing is spawned until the stream is first polled. Dropping the
    /// stream early kills the process.
    fn run_lines(&self, command: ProcessCommand) -> LineStream;
}

pub struct TokioProcessRunner;

enum LineState {
    Pending(ProcessCommand),
    Reading(Box<RunningProcess>),
    Done,
}

struct RunningProcess {
    display: String,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr: JoinHandle<Vec<u8>>,
    started: Instant,
}

impl TokioProcessRunner {
    /// Normalize a line by removing trailing newlines
    fn normalize_line(mut line: String) -> String {
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        line
    }

    /// Convert a std ExitStatus to our ExitStatus enum
    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            Some(signal) => ExitStatus::Signal(signal),
            None => ExitStatus::Error(1),
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    fn log_command_start(command: &ProcessCommand) {
        tracing::debug!("Executing subprocess: {}", command.display());

        if !command.env.is_empty() {
            tracing::trace!("Environment overrides: {:?}", command.env);
        }
        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }
    }

    /// Configure the command with environment and working directory
    fn configure_command(
        command: &ProcessCommand,
    ) -> Result<tokio::process::Command, ProcessError> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);

        // Commands see only the preserved variables plus explicit overrides.
        cmd.env_clear();
        Self::preserve_essential_env(&mut cmd, &command.program)?;
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    /// Preserve essential system environment variables
    fn preserve_essential_env(
        cmd: &mut tokio::process::Command,
        program: &str,
    ) -> Result<(), ProcessError> {
        let optional_vars = ["HOME", "USER", "SHELL", "TMPDIR", "LANG", "LC_ALL", "LC_CTYPE"];

        match std::env::var("PATH") {
            Ok(path) => {
                cmd.env("PATH", path);
            }
            Err(e) => {
                tracing::error!(
                    "Required environment variable PATH is not available for command '{}': {:?}",
                    program,
                    e
                );
                return Err(ProcessError::InternalError {
                    message: format!("PATH is not available (required for '{program}')"),
                });
            }
        }

        for var in optional_vars {
            if let Ok(value) = std::env::var(var) {
                cmd.env(var, value);
            }
        }

        Ok(())
    }

    /// Spawn the child and start collecting its stderr in the background.
    fn spawn_process(command: &ProcessCommand) -> Result<RunningProcess, ProcessError> {
        let display = command.display();
        let mut cmd = Self::configure_command(command)?;

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    "Failed to spawn '{}': {:?} (kind: {:?})",
                    command.program,
                    e,
                    e.kind()
                );
                return Err(resolve_failure(
                    &command.program,
                    &[],
                    Some(e),
                    ExitStatus::Error(-1),
                ));
            }
        };

        let stdout = Self::extract_stream(child.stdout.take(), "stdout")?;
        let mut stderr = Self::extract_stream(child.stderr.take(), "stderr")?;

        let stderr = tokio::spawn(async move {
            let mut collected = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut collected).await {
                tracing::warn!("Failed to read subprocess stderr: {}", e);
            }
            collected
        });

        Ok(RunningProcess {
            display,
            child,
            stdout: BufReader::new(stdout),
            stderr,
            started: Instant::now(),
        })
    }

    /// Extract a stream from a child process, converting None to error
    fn extract_stream<T>(stream: Option<T>, stream_name: &str) -> Result<T, ProcessError> {
        stream.ok_or_else(|| ProcessError::InternalError {
            message: format!("Failed to capture {}", stream_name),
        })
    }

    /// Wait for exit once stdout is drained and resolve the outcome.
    async fn finish(process: RunningProcess) -> Result<(), ProcessError> {
        let RunningProcess {
            display: command_line,
            mut child,
            stderr,
            started,
            ..
        } = process;

        let status = Self::parse_exit_status(child.wait().await?);
        let stderr = stderr.await.unwrap_or_else(|e| {
            tracing::warn!("Stderr collector for '{}' failed: {}", command_line, e);
            Vec::new()
        });

        match status {
            ExitStatus::Success => {
                tracing::debug!(
                    "Subprocess completed successfully in {:?}: {}",
                    started.elapsed(),
                    command_line
                );
                Ok(())
            }
            ExitStatus::Error(code) => {
                tracing::debug!(
                    "Subprocess failed with exit code {} in {:?}: {}",
                    code,
                    started.elapsed(),
                    command_line
                );
                Err(resolve_failure(&command_line, &stderr, None, status))
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!(
                    "Subprocess terminated by signal {} in {:?}: {}",
                    signal,
                    started.elapsed(),
                    command_line
                );
                Err(resolve_failure(&command_line, &stderr, None, status))
            }
        }
    }

    async fn advance(state: LineState) -> Option<(LineItem, LineState)> {
        let mut process = match state {
            LineState::Done => return None,
            LineState::Reading(process) => process,
            LineState::Pending(command) => {
                Self::log_command_start(&command);
                match Self::spawn_process(&command) {
                    Ok(process) => Box::new(process),
                    Err(e) => return Some((Err(e), LineState::Done)),
                }
            }
        };

        let mut buf = Vec::new();
        match process.stdout.read_until(b'\n', &mut buf).await {
            Ok(0) => match Self::finish(*process).await {
                Ok(()) => None,
                Err(e) => Some((Err(e), LineState::Done)),
            },
            Ok(_) => {
                let line = Self::normalize_line(String::from_utf8_lossy(&buf).into_owned());
                tracing::trace!("{}: {}", process.display, line);
                Some((Ok(line), LineState::Reading(process)))
            }
            Err(e) => Some((Err(ProcessError::Io(e)), LineState::Done)),
        }
    }
}

impl ProcessRunner for TokioProcessRunner {
    fn run_lines(&self, command: ProcessCommand) -> LineStream {
        Box::pin(futures::stream::unfold(
            LineState::Pending(command),
            Self::advance,
        ))
    }
}
