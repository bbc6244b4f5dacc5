//! Queue messages as the engine sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{MessageId, Receipt};

/// Transport-level metadata attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Event name, mirrored from the envelope for transports that route or
    /// filter on a subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Set when a message is forwarded to a dead-letter queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_reason: Option<String>,
}

impl MessageMetadata {
    pub fn with_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }
}

/// A message about to be sent.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub message_id: MessageId,
    pub body: Vec<u8>,
    pub metadata: MessageMetadata,
}

impl OutgoingMessage {
    pub fn new(body: Vec<u8>, metadata: MessageMetadata) -> Self {
        Self {
            message_id: MessageId::generate(),
            body,
            metadata,
        }
    }
}

/// One delivery of a message. Only valid until it is settled.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub receipt: Receipt,
    pub body: Vec<u8>,
    pub metadata: MessageMetadata,
    /// Number of times the message has been handed out, this delivery included.
    pub dequeue_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl ReceivedMessage {
    /// Body as text for logging. Invalid UTF-8 is replaced, never rejected.
    pub fn body_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
