//! Wire messages exchanged over a stream port
//!
//! Producer to consumer: `{"type":"data","data":..}` and
//! `{"type":"error","error":{"message":..,"trace":..}}`.
//! Consumer to producer: `{"type":"return","data":..}` and
//! `{"type":"throw","error":..}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProducerMessage<T> {
    Data { data: T },
    Error { error: ErrorPayload },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    /// Best-effort diagnostic detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// `[E####]` code of the failure on the producer side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl ErrorPayload {
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let mut trace = format!("{error:?}");
        let mut source = error.source();
        while let Some(cause) = source {
            trace.push_str(&format!("\ncaused by: {cause}"));
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            trace: Some(trace),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Stop the producer early
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// Fail the producer with the given description
    Throw { error: String },
}
