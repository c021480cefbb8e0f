use super::registry::StreamId;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failure reported by the producer in an `error` message.
    #[error("{message}")]
    Remote {
        message: String,
        trace: Option<String>,
        /// `[E####]` code reported by the producer, if any
        code: Option<u16>,
    },

    #[error("Stream port is closed")]
    PortClosed,

    #[error("Stream {0} already has a consumer waiting for it")]
    StreamAlreadyClaimed(StreamId),

    #[error("Stream {0} was discarded before it could be opened")]
    RendezvousDropped(StreamId),

    #[error("Malformed stream message: {0}")]
    Codec(#[from] serde_json::Error),
}
