use futures::future;
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::consumer::RemoteStream;
use super::port::port_pair;
use super::producer::pump;
use super::registry::{StreamId, StreamRegistry};
use super::TransportError;
use crate::error::BridgeError;
use crate::executor::GitExecutor;
use crate::git::{CommandLines, CommandSource};

/// Host for git command streams.
///
/// `exec` starts a command on the host side and returns its stream id;
/// `open` is the consumer side and resolves the id to a [`RemoteStream`].
/// Every command shares the one executor, so they run one at a time.
#[derive(Clone, Debug)]
pub struct GitBridge {
    executor: GitExecutor,
    registry: StreamRegistry,
    next_id: Arc<AtomicU64>,
}

impl GitBridge {
    pub fn new(executor: GitExecutor) -> Self {
        Self {
            executor,
            registry: StreamRegistry::new(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn executor(&self) -> &GitExecutor {
        &self.executor
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Start `git <args>` and announce its consumer port.
    ///
    /// Must be called within a tokio runtime.
    pub fn exec<I, S>(&self, args: I) -> StreamId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (producer, consumer) = port_pair();
        let lines = self.executor.run(args);

        debug!("Stream {}: starting", id);
        tokio::spawn(pump(id, producer, lines));
        self.registry.deliver(id, consumer);
        id
    }

    /// Resolve `id` to its stream, waiting for the host if needed.
    pub async fn open<T: DeserializeOwned>(
        &self,
        id: StreamId,
    ) -> Result<RemoteStream<T>, TransportError> {
        let port = self.registry.claim(id).await?;
        Ok(RemoteStream::new(id, port))
    }
}

impl CommandSource for GitBridge {
    /// Lines of `git <args>` run through the bridge, ending after the
    /// first failure.
    fn lines(&self, args: Vec<String>) -> CommandLines {
        let id = self.exec(args);
        let bridge = self.clone();
        stream::once(async move { bridge.open::<String>(id).await })
            .map(|opened| match opened {
                Ok(remote) => remote
                    .scan(false, |failed, line| {
                        if *failed {
                            return future::ready(None);
                        }
                        *failed = line.is_err();
                        future::ready(Some(line.map_err(BridgeError::from)))
                    })
                    .boxed(),
                Err(e) => stream::iter([Err(BridgeError::from(e))]).boxed(),
            })
            .flatten()
            .boxed()
    }
}
