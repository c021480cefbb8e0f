//! Streaming git output across a message boundary
//!
//! The host side runs a command and pumps its lines into one end of a
//! [`port_pair`]. The consumer side resolves a stream id to the other end
//! through the [`StreamRegistry`] and reads it as a [`RemoteStream`].
//! Control messages flow back so the consumer can stop the command early
//! or fail it.

pub mod bridge;
pub mod consumer;
pub mod error;
pub mod message;
pub mod port;
pub mod producer;
pub mod registry;
pub mod state;


pub use bridge::GitBridge;
pub use consumer::RemoteStream;
pub use error::TransportError;
pub use message::{ControlMessage, ErrorPayload, ProducerMessage};
pub use port::{port_pair, Port};
pub use producer::pump;
pub use registry::{StreamId, StreamRegistry};
pub use state::StreamState;
