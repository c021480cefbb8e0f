//! Stream id rendezvous
//!
//! The host announces a consumer port under a stream id, and the consumer
//! asks for the port by id. Whichever side arrives first leaves an entry
//! that the other side consumes, so both arrival orders work.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::port::Port;
use super::TransportError;

pub type StreamId = u64;

enum Slot {
    /// A consumer is waiting for the port
    Waiting(oneshot::Sender<Port>),
    /// The port arrived before anyone asked for it
    Ready(Port),
}

#[derive(Clone, Default)]
pub struct StreamRegistry {
    slots: Arc<Mutex<HashMap<StreamId, Slot>>>,
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<StreamId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand `port` to the consumer of `id`, now or when it asks.
    pub fn deliver(&self, id: StreamId, port: Port) {
        let mut slots = self.slots();
        match slots.remove(&id) {
            Some(Slot::Waiting(waiter)) => {
                debug!("Stream {}: delivered to waiting consumer", id);
                if waiter.send(port).is_err() {
                    // Dropping the port tells the producer nobody is listening.
                    debug!("Stream {}: consumer stopped waiting", id);
                }
            }
            Some(Slot::Ready(_stale)) => {
                warn!("Stream {}: delivered twice, replacing the earlier port", id);
                slots.insert(id, Slot::Ready(port));
            }
            None => {
                debug!("Stream {}: parked until a consumer asks", id);
                slots.insert(id, Slot::Ready(port));
            }
        }
    }

    /// Wait for the port of `id`.
    ///
    /// Only one consumer may wait per id.
    pub async fn claim(&self, id: StreamId) -> Result<Port, TransportError> {
        let waiting = {
            let mut slots = self.slots();
            match slots.remove(&id) {
                Some(Slot::Ready(port)) => return Ok(port),
                Some(Slot::Waiting(waiter)) if !waiter.is_closed() => {
                    slots.insert(id, Slot::Waiting(waiter));
                    return Err(TransportError::StreamAlreadyClaimed(id));
                }
                // An earlier claim was abandoned; take its place.
                Some(Slot::Waiting(_)) | None => {}
            }
            let (waiter, waiting) = oneshot::channel();
            slots.insert(id, Slot::Waiting(waiter));
            waiting
        };

        waiting
            .await
            .map_err(|_| TransportError::RendezvousDropped(id))
    }

    /// Forget `id`, failing a waiting consumer and closing a parked port.
    pub fn discard(&self, id: StreamId) -> bool {
        self.slots().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
