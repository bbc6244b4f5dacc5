//! InMemoryQueue - poll queue for development and tests
//!
//! Behaves like a hosted storage queue in the ways the consumers care about:
//! - the queue must be created before it can be used;
//! - a received message is hidden for the visibility timeout, then handed out
//!   again with a higher dequeue count;
//! - every delivery gets a fresh receipt, and only the current receipt can
//!   delete the message.
//!
//! Time is `tokio::time::Instant`, so paused-clock tests can step through
//! visibility timeouts.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{MessageId, MessageMetadata, OutgoingMessage, Receipt, ReceivedMessage};
use crate::error::TransportError;
use crate::ports::{PollQueue, QueueSender};

pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

struct StoredMessage {
    message_id: MessageId,
    body: Vec<u8>,
    metadata: MessageMetadata,
    enqueued_at: DateTime<Utc>,
    dequeue_count: u32,
    visible_at: Instant,
    /// Receipt of the outstanding delivery, if any.
    receipt: Option<Receipt>,
}

#[derive(Default)]
struct QueueState {
    created: bool,
    /// Enqueue order.
    messages: VecDeque<StoredMessage>,
    next_receipt: u64,
}

impl QueueState {
    fn ensure_created(&self, name: &str) -> Result<(), TransportError> {
        if self.created {
            Ok(())
        } else {
            Err(TransportError::QueueNotFound(name.to_string()))
        }
    }

    fn find_delivery(&self, message: &ReceivedMessage) -> Result<usize, TransportError> {
        let index = self
            .messages
            .iter()
            .position(|m| m.message_id == message.message_id)
            .ok_or_else(|| TransportError::MessageNotFound(message.message_id.to_string()))?;
        if self.messages[index].receipt.as_ref() != Some(&message.receipt) {
            return Err(TransportError::ReceiptMismatch(message.message_id.to_string()));
        }
        Ok(index)
    }
}

pub struct InMemoryQueue {
    name: String,
    visibility_timeout: Duration,
    state: Mutex<QueueState>,
    arrivals: Notify,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_visibility_timeout(name, DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(name: impl Into<String>, visibility_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            visibility_timeout,
            state: Mutex::new(QueueState::default()),
            arrivals: Notify::new(),
        }
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    /// All stored messages, visible or not.
    pub async fn len(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Messages a `receive` issued now could return.
    pub async fn visible_len(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock().await;
        state.messages.iter().filter(|m| m.visible_at <= now).count()
    }

    /// Bodies of every stored message in enqueue order.
    pub async fn bodies(&self) -> Vec<Vec<u8>> {
        let state = self.state.lock().await;
        state.messages.iter().map(|m| m.body.clone()).collect()
    }

    /// Metadata of every stored message in enqueue order.
    pub async fn metadata(&self) -> Vec<MessageMetadata> {
        let state = self.state.lock().await;
        state.messages.iter().map(|m| m.metadata.clone()).collect()
    }

    /// Make a delivery visible again right away and void its receipt.
    pub async fn release(&self, message: &ReceivedMessage) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.ensure_created(&self.name)?;
        let index = state.find_delivery(message)?;
        let stored = &mut state.messages[index];
        stored.visible_at = Instant::now();
        stored.receipt = None;
        drop(state);
        self.arrivals.notify_one();
        Ok(())
    }

    /// Wait until something is sent, or at most `timeout`.
    pub(crate) async fn wait_for_arrival(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.arrivals.notified()).await;
    }
}

#[async_trait]
impl QueueSender for InMemoryQueue {
    fn queue_name(&self) -> &str {
        &self.name
    }

    async fn create_if_absent(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if !state.created {
            debug!(queue = %self.name, "creating queue");
            state.created = true;
        }
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.ensure_created(&self.name)?;
        state.messages.push_back(StoredMessage {
            message_id: message.message_id,
            body: message.body,
            metadata: message.metadata,
            enqueued_at: Utc::now(),
            dequeue_count: 0,
            visible_at: Instant::now(),
            receipt: None,
        });
        drop(state);
        self.arrivals.notify_one();
        Ok(())
    }
}

#[async_trait]
impl PollQueue for InMemoryQueue {
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>, TransportError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.ensure_created(&self.name)?;

        let mut received = Vec::new();
        let mut next_receipt = state.next_receipt;
        for stored in state.messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }
            if stored.visible_at > now {
                continue;
            }
            next_receipt += 1;
            let receipt = Receipt::new(format!("{}#{next_receipt}", stored.message_id));
            stored.dequeue_count += 1;
            stored.visible_at = now + self.visibility_timeout;
            stored.receipt = Some(receipt.clone());
            received.push(ReceivedMessage {
                message_id: stored.message_id,
                receipt,
                body: stored.body.clone(),
                metadata: stored.metadata.clone(),
                dequeue_count: stored.dequeue_count,
                enqueued_at: stored.enqueued_at,
            });
        }
        state.next_receipt = next_receipt;
        Ok(received)
    }

    async fn delete(&self, message: &ReceivedMessage) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.ensure_created(&self.name)?;
        let index = state.find_delivery(message)?;
        state.messages.remove(index);
        Ok(())
    }
}
