//! Linked message endpoints
//!
//! A port pair is two endpoints where frames sent on one arrive on the
//! other, in order. Frames are JSON text so both halves only agree on the
//! wire format. Closing or dropping either endpoint is observed by the peer
//! as the end of its incoming frames.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use super::error::TransportError;

#[derive(Debug)]
pub struct Port {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Create two linked endpoints.
pub fn port_pair() -> (Port, Port) {
    let (left_tx, right_rx) = mpsc::unbounded_channel();
    let (right_tx, left_rx) = mpsc::unbounded_channel();
    (
        Port {
            tx: Some(left_tx),
            rx: left_rx,
        },
        Port {
            tx: Some(right_tx),
            rx: right_rx,
        },
    )
}

impl Port {
    pub fn send<M: Serialize>(&self, message: &M) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::PortClosed)?;
        let frame = serde_json::to_string(message)?;
        tracing::trace!("Port send: {}", frame);
        tx.send(frame).map_err(|_| TransportError::PortClosed)
    }

    /// Next message from the peer; `None` once the peer has closed.
    pub async fn recv<M: DeserializeOwned>(&mut self) -> Option<Result<M, TransportError>> {
        futures::future::poll_fn(|cx| self.poll_recv(cx)).await
    }

    pub fn poll_recv<M: DeserializeOwned>(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<M, TransportError>>> {
        self.rx.poll_recv(cx).map(|frame| {
            frame.map(|frame| {
                tracing::trace!("Port recv: {}", frame);
                serde_json::from_str(&frame).map_err(TransportError::from)
            })
        })
    }

    /// Close both directions. Frames already sent by the peer stay readable.
    pub fn close(&mut self) {
        self.tx = None;
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }
}
