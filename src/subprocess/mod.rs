//! Subprocess line streaming
//!
//! Runs an external command and exposes its standard output as a lazy
//! sequence of lines. Standard error is collected on the side and only
//! surfaces, together with the exit status, once stdout has been drained.

pub mod error;
pub mod mock;
pub mod runner;

#[cfg(test)]
mod tests;

pub use error::{resolve_failure, ProcessError};
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::{ExitStatus, LineItem, LineStream, ProcessCommand, ProcessRunner, TokioProcessRunner};

use futures::StreamExt;

/// Drain a line stream, returning every line or the first failure.
pub async fn collect_lines(mut lines: LineStream) -> Result<Vec<String>, ProcessError> {
    let mut collected = Vec::new();
    while let Some(line) = lines.next().await {
        collected.push(line?);
    }
    Ok(collected)
}
