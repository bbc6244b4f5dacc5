//! EventEnvelope - the single wire format used by every transport
//!
//! ```json
//! {"eventName": "Accept", "data": "{\"transactionId\":\"abc\"}"}
//! ```
//!
//! `data` is itself a JSON document encoded as a string, so the outer shape
//! stays fixed no matter what the event looks like.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub event_name: String,
    pub data: String,
}

impl EventEnvelope {
    pub fn new(event_name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            data: data.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Two string fields always serialize.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes)
            .map_err(|e| CodecError::MalformedPayload(format!("envelope: {e}")))
    }
}
