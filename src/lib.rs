//! # gitbridge
//!
//! Runs git on behalf of consumers that cannot spawn processes themselves,
//! streaming output line by line instead of buffering it.
//!
//! ## Modules
//!
//! - `sync` - Fair FIFO async mutex with acquire timeouts
//! - `subprocess` - Lazy, cancellable stdout line streams from external commands
//! - `executor` - Serialized git invocations sharing one lock and working directory
//! - `git` - Log and reference parsers plus a structured git client
//! - `transport` - Duplex message streams with stream id rendezvous
//! - `config` - TOML and environment configuration
//! - `error` - Crate-wide error type with stable error codes
//!
//! ## Example
//!
//! ```no_run
//! use futures::StreamExt;
//! use gitbridge::executor::GitExecutor;
//! use gitbridge::transport::GitBridge;
//!
//! # async fn demo() -> Result<(), gitbridge::transport::TransportError> {
//! let bridge = GitBridge::new(GitExecutor::new());
//! let id = bridge.exec(["rev-parse", "HEAD"]);
//! let mut lines = bridge.open::<String>(id).await?;
//! while let Some(line) = lines.next().await {
//!     println!("{}", line?);
//! }
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod error;
pub mod executor;
pub mod git;
pub mod subprocess;
pub mod sync;
pub mod transport;

pub use error::{BridgeError, ErrorCode, Result};
