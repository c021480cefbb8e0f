//! Consumer half: rebuilds a stream from port messages

use futures::Stream;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, trace};

use super::message::{ControlMessage, ProducerMessage};
use super::port::Port;
use super::registry::StreamId;
use super::state::StreamState;
use super::TransportError;

/// Items sent by a remote producer, read in order.
///
/// Ends when the producer closes, or after yielding the producer's error.
/// Dropping it before then tells the producer to stop.
pub struct RemoteStream<T> {
    id: StreamId,
    port: Option<Port>,
    state: StreamState<T>,
    _items: PhantomData<fn() -> T>,
}

impl<T> Unpin for RemoteStream<T> {}

impl<T> std::fmt::Debug for RemoteStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStream")
            .field("id", &self.id)
            .field("connected", &self.port.is_some())
            .field("queued", &self.state.queued())
            .finish()
    }
}

impl<T: DeserializeOwned> RemoteStream<T> {
    pub fn new(id: StreamId, port: Port) -> Self {
        Self {
            id,
            port: Some(port),
            state: StreamState::new(),
            _items: PhantomData,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Stop early, sending a single `return` message to the producer.
    pub fn cancel(&mut self, data: Option<serde_json::Value>) {
        self.finish_with(ControlMessage::Return { data });
    }

    /// Stop early, asking the producer to fail with `error`.
    pub fn throw(&mut self, error: impl std::fmt::Display) {
        self.finish_with(ControlMessage::Throw {
            error: error.to_string(),
        });
    }

    fn finish_with(&mut self, message: ControlMessage) {
        if self.state.is_finished() {
            return;
        }
        self.state.finish();
        if let Some(mut port) = self.port.take() {
            debug!("Stream {}: sending {:?}", self.id, message);
            if let Err(e) = port.send(&message) {
                trace!("Stream {}: producer already gone: {}", self.id, e);
            }
            port.close();
        }
    }

    /// Move every message that has already arrived into the state.
    fn drain_port(&mut self, cx: &mut Context<'_>) {
        let Some(port) = self.port.as_mut() else {
            return;
        };
        loop {
            match port.poll_recv::<ProducerMessage<T>>(cx) {
                Poll::Ready(Some(Ok(ProducerMessage::Data { data }))) => self.state.push(data),
                Poll::Ready(Some(Ok(ProducerMessage::Error { error }))) => {
                    self.state.fail(TransportError::Remote {
                        message: error.message,
                        trace: error.trace,
                        code: error.code,
                    })
                }
                Poll::Ready(Some(Err(e))) => self.state.fail(e),
                Poll::Ready(None) => {
                    self.state.close();
                    break;
                }
                Poll::Pending => break,
            }
        }
    }
}

impl<T: DeserializeOwned> Stream for RemoteStream<T> {
    type Item = Result<T, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.drain_port(cx);
        let next = this.state.poll_read(cx);
        if this.state.is_finished() {
            if let Some(mut port) = this.port.take() {
                port.close();
            }
        }
        next
    }
}

impl<T> Drop for RemoteStream<T> {
    fn drop(&mut self) {
        if self.state.is_finished() {
            return;
        }
        if let Some(port) = self.port.take() {
            debug!("Stream {}: dropped before completion, returning", self.id);
            let _ = port.send(&ControlMessage::Return { data: None });
        }
    }
}
