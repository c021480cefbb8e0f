//! Structured git operations
//!
//! [`GitClient`] turns raw git output into [`GitLog`] and [`GitRef`]
//! records. It is generic over a [`CommandSource`], so the same client
//! works against a local [`GitExecutor`] or a stream opened through the
//! transport.

pub mod parsers;
pub mod types;

pub use parsers::*;
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::executor::GitExecutor;

/// Lines of one git invocation, failing at most once at the end.
pub type CommandLines = BoxStream<'static, std::result::Result<String, BridgeError>>;

/// Anything that can run `git <args>` and stream the output lines.
pub trait CommandSource: Send + Sync {
    fn lines(&self, args: Vec<String>) -> CommandLines;
}

impl CommandSource for GitExecutor {
    fn lines(&self, args: Vec<String>) -> CommandLines {
        self.run(args).map(|line| line.map_err(BridgeError::from)).boxed()
    }
}

impl<T: CommandSource + ?Sized> CommandSource for Arc<T> {
    fn lines(&self, args: Vec<String>) -> CommandLines {
        (**self).lines(args)
    }
}

/// Git read operations
#[async_trait]
pub trait GitReader: Send + Sync {
    /// First line of `git version`
    async fn version(&self) -> Result<String>;

    /// Abbreviated name of the checked-out branch
    async fn current_branch(&self) -> Result<String>;

    /// Commits selected by `options`, unparseable lines skipped
    async fn log(&self, options: &LogOptions) -> Result<Vec<GitLog>>;

    /// Every reference listed by `git show-ref`
    async fn show_ref(&self) -> Result<Vec<GitRef>>;
}

/// Git write operations
#[async_trait]
pub trait GitWriter: Send + Sync {
    /// Fetch from `remote`, or the default remote when `None`
    async fn fetch(&self, remote: Option<&str>) -> Result<()>;
}

pub struct GitClient<S> {
    source: S,
}

impl<S: CommandSource> GitClient<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn lines(&self, args: &[&str]) -> CommandLines {
        self.source
            .lines(args.iter().map(|arg| arg.to_string()).collect())
    }

    /// First output line; dropping the rest ends the command early.
    async fn first_line(&self, args: &[&str]) -> Result<String> {
        let mut lines = self.lines(args);
        match lines.next().await {
            Some(line) => line,
            None => Err(BridgeError::execution(format!(
                "git {} produced no output",
                args.join(" ")
            ))),
        }
    }
}

#[async_trait]
impl<S: CommandSource> GitReader for GitClient<S> {
    async fn version(&self) -> Result<String> {
        self.first_line(&["version"]).await
    }

    async fn current_branch(&self) -> Result<String> {
        self.first_line(&["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .map_err(|e| e.with_context("getting current branch"))
    }

    async fn log(&self, options: &LogOptions) -> Result<Vec<GitLog>> {
        let mut lines = self.source.lines(options.to_args());
        let mut logs = Vec::new();
        while let Some(line) = lines.next().await {
            if let Some(log) = parse_log_line(&line?) {
                logs.push(log);
            }
        }
        debug!("Parsed {} log entries", logs.len());
        Ok(logs)
    }

    async fn show_ref(&self) -> Result<Vec<GitRef>> {
        let mut lines = self.lines(&["show-ref"]);
        let mut refs = Vec::new();
        while let Some(line) = lines.next().await {
            let line = line.map_err(|e| e.with_context("listing references"))?;
            if let Some(git_ref) = parse_show_ref_line(&line) {
                refs.push(git_ref);
            }
        }
        debug!("Parsed {} references", refs.len());
        Ok(refs)
    }
}

#[async_trait]
impl<S: CommandSource> GitWriter for GitClient<S> {
    async fn fetch(&self, remote: Option<&str>) -> Result<()> {
        let mut args = vec!["fetch"];
        if let Some(remote) = remote.filter(|r| !r.is_empty()) {
            args.push(remote);
        }

        let mut lines = self.lines(&args);
        while let Some(line) = lines.next().await {
            line?;
        }
        Ok(())
    }
}
