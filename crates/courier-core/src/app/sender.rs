//! Sender - typed events onto a queue.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{Event, MessageId, MessageMetadata, OutgoingMessage};
use crate::error::SendError;
use crate::ports::QueueSender;
use crate::typed::EnvelopeCodec;

#[derive(Clone)]
pub struct Sender {
    queue: Arc<dyn QueueSender>,
}

impl Sender {
    pub fn new(queue: Arc<dyn QueueSender>) -> Self {
        Self { queue }
    }

    pub fn queue_name(&self) -> &str {
        self.queue.queue_name()
    }

    /// Encode and transmit one event. No retry; transport errors are returned
    /// as they are.
    pub async fn send<E: Event>(&self, event: &E) -> Result<MessageId, SendError> {
        let body = EnvelopeCodec::encode(event)?;
        let message = OutgoingMessage::new(body, MessageMetadata::with_subject(E::event_name()));
        let message_id = message.message_id;

        self.queue.send(message).await?;
        debug!(queue = %self.queue.queue_name(), message_id = %message_id, event = E::event_name(), "sent event");
        Ok(message_id)
    }

    /// Send in order, stopping at the first failure. Events before the
    /// failing one stay sent.
    pub async fn send_batch<E: Event>(&self, events: &[E]) -> Result<Vec<MessageId>, SendError> {
        let mut ids = Vec::with_capacity(events.len());
        for event in events {
            ids.push(self.send(event).await?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventEnvelope;
    use crate::error::TransportError;
    use crate::impls::InMemoryQueue;
    use crate::ports::PollQueue;
    use crate::typed::registry::fixtures::AcceptEvent;

    fn accept(id: &str) -> AcceptEvent {
        AcceptEvent {
            transaction_id: id.into(),
        }
    }

    #[tokio::test]
    async fn test_send_writes_envelope_and_subject() {
        let queue = Arc::new(InMemoryQueue::new("orders"));
        queue.create_if_absent().await.unwrap();
        let sender = Sender::new(queue.clone());

        let id = sender.send(&accept("abc")).await.unwrap();

        let delivered = queue.receive(1).await.unwrap().remove(0);
        assert_eq!(delivered.message_id, id);
        assert_eq!(delivered.metadata.subject.as_deref(), Some("Accept"));
        let envelope = EventEnvelope::from_bytes(&delivered.body).unwrap();
        assert_eq!(envelope.event_name, "Accept");
        assert_eq!(envelope.data, r#"{"transactionId":"abc"}"#);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_as_send_error() {
        let sender = Sender::new(Arc::new(InMemoryQueue::new("missing")));
        let err = sender.send(&accept("abc")).await.unwrap_err();
        assert!(matches!(
            err,
            SendError::Transport(TransportError::QueueNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_send_batch_preserves_order_and_unique_ids() {
        let queue = Arc::new(InMemoryQueue::new("orders"));
        queue.create_if_absent().await.unwrap();
        let sender = Sender::new(queue.clone());

        let ids = sender
            .send_batch(&[accept("1"), accept("2"), accept("3")])
            .await
            .unwrap();

        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);
        let delivered = queue.receive(3).await.unwrap();
        let order: Vec<_> = delivered.iter().map(|m| m.message_id).collect();
        assert_eq!(order, ids);
    }
}
