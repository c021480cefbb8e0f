//! Producer half: forwards a local stream over a port
//!
//! Items become `data` messages and a failure becomes a single `error`
//! message. A `return` message or the consumer closing its end stops the
//! source early; a `throw` message stops it and reports the injected error.
//! Either way the source is dropped exactly once and the port is closed.

use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::message::{ControlMessage, ErrorPayload, ProducerMessage};
use super::port::Port;
use super::registry::StreamId;
use super::TransportError;
use crate::error::BridgeError;

enum Event<I> {
    Control(Option<Result<ControlMessage, TransportError>>),
    Item(Option<I>),
}

/// Drive `source` to completion or cancellation, mirroring it onto `port`.
pub async fn pump<S, T, E>(id: StreamId, mut port: Port, source: S)
where
    S: Stream<Item = Result<T, E>> + Send,
    T: Serialize,
    E: std::error::Error + Into<BridgeError>,
{
    let mut source = Box::pin(source);
    let mut sent = 0usize;

    loop {
        let event = tokio::select! {
            biased;
            control = port.recv::<ControlMessage>() => Event::Control(control),
            item = source.next() => Event::Item(item),
        };

        match event {
            Event::Control(None) => {
                debug!("Stream {}: consumer closed its end", id);
                break;
            }
            Event::Control(Some(Ok(ControlMessage::Return { .. }))) => {
                debug!("Stream {}: consumer returned after {} items", id, sent);
                break;
            }
            Event::Control(Some(Ok(ControlMessage::Throw { error }))) => {
                warn!("Stream {}: consumer injected error: {}", id, error);
                post(
                    id,
                    &port,
                    &ProducerMessage::<T>::Error {
                        error: ErrorPayload {
                            message: error,
                            trace: None,
                            code: None,
                        },
                    },
                );
                break;
            }
            Event::Control(Some(Err(e))) => {
                warn!("Stream {}: ignoring malformed control message: {}", id, e);
            }
            Event::Item(Some(Ok(data))) => {
                if !post(id, &port, &ProducerMessage::Data { data }) {
                    break;
                }
                sent += 1;
            }
            Event::Item(Some(Err(e))) => {
                debug!("Stream {}: source failed after {} items: {}", id, sent, e);
                let payload = ErrorPayload::from_error(&e);
                let error: BridgeError = e.into();
                let code = error.code();
                post(
                    id,
                    &port,
                    &ProducerMessage::<T>::Error {
                        error: payload.with_code(code),
                    },
                );
                break;
            }
            Event::Item(None) => {
                debug!("Stream {}: completed with {} items", id, sent);
                break;
            }
        }
    }

    drop(source);
    port.close();
    trace!("Stream {}: port closed", id);
}

/// Send one message, reporting whether the consumer can still hear us.
fn post<T: Serialize>(id: StreamId, port: &Port, message: &ProducerMessage<T>) -> bool {
    match port.send(message) {
        Ok(()) => true,
        Err(e) => {
            warn!("Stream {}: failed to send message: {}", id, e);
            false
        }
    }
}
