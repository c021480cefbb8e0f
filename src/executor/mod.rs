//! Serialized git command execution
//!
//! Every invocation made through one [`GitExecutor`] (or any of its clones)
//! waits on the same [`FifoMutex`], so at most one git process touches the
//! repository at a time and callers are served in the order they call
//! `run`. The lock is held for as long as the returned line stream is alive.

use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::subprocess::{
    LineItem, LineStream, ProcessCommand, ProcessError, ProcessRunner, TokioProcessRunner,
};
use crate::sync::{FifoMutex, FifoMutexGuard, LockTicket};


#[derive(Clone)]
pub struct GitExecutor {
    program: String,
    env: HashMap<String, String>,
    lock: FifoMutex,
    cwd: Arc<RwLock<Option<PathBuf>>>,
    lock_timeout: Option<Duration>,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for GitExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitExecutor")
            .field("program", &self.program)
            .field("cwd", &self.cwd())
            .field("lock", &self.lock)
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for GitExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything an invocation needs once it is admitted.
struct Admission {
    ticket: LockTicket,
    lock_timeout: Option<Duration>,
    cwd: Arc<RwLock<Option<PathBuf>>>,
    command: ProcessCommand,
    runner: Arc<dyn ProcessRunner>,
}

/// An admitted invocation.
///
/// Field order matters: the process stream drops before the guard.
struct Running {
    lines: LineStream,
    _guard: FifoMutexGuard,
}

enum RunState {
    Waiting(Box<Admission>),
    Running(Running),
    Done,
}

impl GitExecutor {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(TokioProcessRunner))
    }

    pub fn with_runner(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            program: "git".to_string(),
            env: HashMap::new(),
            lock: FifoMutex::new(),
            cwd: Arc::new(RwLock::new(None)),
            lock_timeout: None,
            runner,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new().configured(config)
    }

    /// Apply program, environment, lock timeout and initial directory.
    pub fn configured(mut self, config: &BridgeConfig) -> Self {
        self.program = config.git_program.clone();
        self.env = config.env.clone();
        self.lock_timeout = config.lock_timeout();
        if let Some(dir) = &config.working_dir {
            self.set_cwd(dir);
        }
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Give up waiting for the lock after `timeout` instead of waiting forever.
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The lock shared by every invocation of this executor.
    pub fn lock(&self) -> &FifoMutex {
        &self.lock
    }

    pub fn cwd(&self) -> Option<PathBuf> {
        self.cwd
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Point later invocations at `folder`.
    ///
    /// Returns `true` only when `folder` is non-empty and differs from the
    /// current directory. Must not be called while a command is in flight.
    pub fn set_cwd(&self, folder: impl AsRef<Path>) -> bool {
        let folder = folder.as_ref();
        if folder.as_os_str().is_empty() {
            return false;
        }

        let mut cwd = self.cwd.write().unwrap_or_else(PoisonError::into_inner);
        if cwd.as_deref() == Some(folder) {
            return false;
        }
        debug!("Working directory set to {}", folder.display());
        *cwd = Some(folder.to_path_buf());
        true
    }

    /// Run `git <args>` and stream its stdout lines.
    ///
    /// The invocation takes its place in the lock queue immediately; the
    /// process is spawned once the stream is polled and the lock is granted.
    /// The lock is released as soon as the stream finishes, fails or is
    /// dropped.
    pub fn run<I, S>(&self, args: I) -> LineStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = ProcessCommand::new(self.program.clone())
            .with_args(args)
            .with_env(&self.env);
        let admission = Admission {
            ticket: self.lock.enqueue(),
            lock_timeout: self.lock_timeout,
            cwd: Arc::clone(&self.cwd),
            command,
            runner: Arc::clone(&self.runner),
        };
        Box::pin(futures::stream::unfold(
            RunState::Waiting(Box::new(admission)),
            advance,
        ))
    }
}

async fn admit(admission: Admission) -> Result<Running, ProcessError> {
    let Admission {
        ticket,
        lock_timeout,
        cwd,
        command,
        runner,
    } = admission;

    let guard = match lock_timeout {
        Some(limit) => ticket.wait_timeout(limit).await?,
        None => ticket.wait().await?,
    };

    // Read after admission: a change made behind the previous command applies.
    let dir = cwd.read().unwrap_or_else(PoisonError::into_inner).clone();
    let command = command.in_dir(dir);
    debug!("Admitted: {}", command.display());
    Ok(Running {
        lines: runner.run_lines(command),
        _guard: guard,
    })
}

async fn advance(state: RunState) -> Option<(LineItem, RunState)> {
    let mut running = match state {
        RunState::Done => return None,
        RunState::Running(running) => running,
        RunState::Waiting(admission) => match admit(*admission).await {
            Ok(running) => running,
            Err(e) => return Some((Err(e), RunState::Done)),
        },
    };

    match running.lines.next().await {
        Some(Ok(line)) => Some((Ok(line), RunState::Running(running))),
        // Dropping `running` kills the process, then releases the lock.
        Some(Err(e)) => Some((Err(e), RunState::Done)),
        None => None,
    }
}
