//! Settlement - what happens to a message after processing.
//!
//! The default deletes every message, failed or not, so a poison message can
//! never wedge the queue. The price is that a failed message is gone. The
//! dead-letter policy keeps failed messages around instead: it lets the
//! queue redeliver them a bounded number of times and then parks them on a
//! separate queue.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::domain::{OutgoingMessage, ReceivedMessage};
use crate::error::ProcessingError;
use crate::ports::QueueSender;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    DeleteAlways,
    DeadLetterAfter { max_deliveries: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Remove from the queue.
    Delete,
    /// Leave it for redelivery.
    Release,
    /// Forward to the dead-letter queue, then remove.
    DeadLetter,
}

impl FailurePolicy {
    pub fn settle(&self, outcome: Result<(), &ProcessingError>, dequeue_count: u32) -> Settlement {
        let Err(error) = outcome else {
            return Settlement::Delete;
        };
        match *self {
            FailurePolicy::DeleteAlways => Settlement::Delete,
            FailurePolicy::DeadLetterAfter { max_deliveries } => {
                if !error.is_retryable() || dequeue_count >= max_deliveries {
                    Settlement::DeadLetter
                } else {
                    Settlement::Release
                }
            }
        }
    }
}

/// Copy a failed message to the dead-letter queue, keeping its id and body.
///
/// The caller removes the original afterwards whatever happens here, so a
/// forwarding failure loses the message; it is logged with the body.
pub(crate) async fn forward_to_dead_letter(
    target: Option<&Arc<dyn QueueSender>>,
    source_queue: &str,
    message: &ReceivedMessage,
    reason: &ProcessingError,
) {
    let Some(target) = target else {
        warn!(queue = %source_queue, message_id = %message.message_id, "no dead-letter queue configured, dropping message");
        return;
    };

    let mut metadata = message.metadata.clone();
    metadata.dead_letter_reason = Some(reason.to_string());
    let forwarded = OutgoingMessage {
        message_id: message.message_id,
        body: message.body.clone(),
        metadata,
    };

    match target.send(forwarded).await {
        Ok(()) => {
            warn!(queue = %source_queue, dead_letter_queue = %target.queue_name(), message_id = %message.message_id, dequeue_count = message.dequeue_count, "message dead-lettered")
        }
        Err(err) => error!(
            queue = %source_queue,
            dead_letter_queue = %target.queue_name(),
            message_id = %message.message_id,
            body = %message.body_lossy(),
            error = %err,
            "failed to forward message to dead-letter queue"
        ),
    }
}
