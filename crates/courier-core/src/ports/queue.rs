//! Queue ports.
//!
//! The queue is an opaque byte channel with at-least-once delivery. A
//! received message stays invisible to other consumers until it is deleted,
//! or until its visibility timeout lapses and it is delivered again.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{OutgoingMessage, ReceivedMessage};
use crate::error::{ConsumerError, TransportError};

#[async_trait]
pub trait QueueSender: Send + Sync {
    fn queue_name(&self) -> &str;

    /// Idempotent.
    async fn create_if_absent(&self) -> Result<(), TransportError>;

    async fn send(&self, message: OutgoingMessage) -> Result<(), TransportError>;
}

/// Pull-style queue: the consumer asks for messages.
#[async_trait]
pub trait PollQueue: QueueSender {
    /// Up to `max_messages` currently visible messages. Never blocks waiting
    /// for new ones; an empty vec means the queue is drained.
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>, TransportError>;

    /// Delete using the delivery's receipt.
    async fn delete(&self, message: &ReceivedMessage) -> Result<(), TransportError>;
}

/// Callbacks bound to a push queue.
///
/// The transport may call `on_message` for several messages at once.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// An `Err` tells the transport the message was not settled; a push queue
    /// should make it visible again.
    async fn on_message(&self, message: ReceivedMessage) -> Result<(), ConsumerError>;

    /// Transport-level trouble (connectivity, lock loss, ...). The transport
    /// keeps running and reconnects on its own.
    async fn on_error(&self, error: TransportError);
}

/// Push-style queue: the transport drives delivery.
#[async_trait]
pub trait PushQueue: QueueSender {
    /// Start delivering to `processor`. At most one processor per queue.
    async fn bind(&self, processor: Arc<dyn MessageProcessor>) -> Result<(), TransportError>;

    /// Stop delivering and wait for in-flight callbacks to finish.
    /// Unbinding an unbound queue is a no-op.
    async fn unbind(&self) -> Result<(), TransportError>;

    /// Settle a delivery as done; the message is removed.
    async fn complete(&self, message: &ReceivedMessage) -> Result<(), TransportError>;

    /// Give a delivery back; the message becomes visible again immediately.
    async fn abandon(&self, message: &ReceivedMessage) -> Result<(), TransportError>;
}
