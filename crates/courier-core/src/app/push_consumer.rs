//! PushConsumer - bind a processor to a push transport
//!
//! ```text
//! Stopped --start--> Starting --bound--> Running --stop--> Stopping --> Stopped
//!            ^           |
//!            +-- bind failed
//! ```
//!
//! The transport decides concurrency. Each callback decodes, dispatches and
//! settles its own message; nothing but the registry is shared between them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use super::dispatcher::{DispatchReport, HandlerDispatcher};
use super::settlement::{FailurePolicy, Settlement, forward_to_dead_letter};
use crate::config::MessagingOptions;
use crate::domain::{EventEnvelope, ReceivedMessage};
use crate::error::{ConsumerError, ProcessingError, TransportError};
use crate::ports::{MessageProcessor, PushQueue, QueueSender};
use crate::typed::EnvelopeCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Clone, Default)]
pub struct PushOptions {
    pub failure_policy: FailurePolicy,
    /// Where `Settlement::DeadLetter` forwards messages.
    pub dead_letter: Option<Arc<dyn QueueSender>>,
}

impl PushOptions {
    pub fn with_dead_letter(mut self, target: Arc<dyn QueueSender>) -> Self {
        self.dead_letter = Some(target);
        self
    }
}

impl fmt::Debug for PushOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushOptions")
            .field("failure_policy", &self.failure_policy)
            .field("dead_letter", &self.dead_letter.as_ref().map(|q| q.queue_name()))
            .finish()
    }
}

impl From<&MessagingOptions> for PushOptions {
    fn from(options: &MessagingOptions) -> Self {
        Self {
            failure_policy: options.failure_policy,
            dead_letter: None,
        }
    }
}

pub struct PushConsumer {
    queue: Arc<dyn PushQueue>,
    processor: Arc<CallbackProcessor>,
    /// Serializes start/stop.
    lifecycle: Mutex<()>,
    state: watch::Sender<ConsumerState>,
}

impl PushConsumer {
    pub fn new(queue: Arc<dyn PushQueue>, dispatcher: Arc<HandlerDispatcher>, options: PushOptions) -> Self {
        let processor = Arc::new(CallbackProcessor {
            queue: queue.clone(),
            dispatcher,
            policy: options.failure_policy,
            dead_letter: options.dead_letter,
        });
        Self {
            queue,
            processor,
            lifecycle: Mutex::new(()),
            state: watch::Sender::new(ConsumerState::Stopped),
        }
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    pub async fn start(&self) -> Result<(), ConsumerError> {
        let _lifecycle = self.lifecycle.lock().await;
        let queue = self.queue.queue_name();
        if self.state() != ConsumerState::Stopped {
            return Err(ConsumerError::AlreadyRunning(queue.to_string()));
        }

        self.state.send_replace(ConsumerState::Starting);
        let processor: Arc<dyn MessageProcessor> = self.processor.clone();
        let bound = match self.queue.create_if_absent().await {
            Ok(()) => self.queue.bind(processor).await,
            Err(err) => Err(err),
        };

        match bound {
            Ok(()) => {
                self.state.send_replace(ConsumerState::Running);
                info!(queue = %queue, "push consumer started");
                Ok(())
            }
            Err(err) => {
                self.state.send_replace(ConsumerState::Stopped);
                error!(queue = %queue, error = %err, "failed to start push consumer");
                Err(err.into())
            }
        }
    }

    /// Unbind and wait for in-flight callbacks. A no-op unless running.
    pub async fn stop(&self) -> Result<(), ConsumerError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.state() != ConsumerState::Running {
            return Ok(());
        }

        let queue = self.queue.queue_name();
        self.state.send_replace(ConsumerState::Stopping);
        info!(queue = %queue, "stopping push consumer");
        let unbound = self.queue.unbind().await;
        self.state.send_replace(ConsumerState::Stopped);
        unbound?;
        info!(queue = %queue, "push consumer stopped");
        Ok(())
    }
}

struct CallbackProcessor {
    queue: Arc<dyn PushQueue>,
    dispatcher: Arc<HandlerDispatcher>,
    policy: FailurePolicy,
    dead_letter: Option<Arc<dyn QueueSender>>,
}

impl CallbackProcessor {
    async fn process(&self, message: &ReceivedMessage) -> Result<DispatchReport, ProcessingError> {
        let envelope = EventEnvelope::from_bytes(&message.body)?;
        if let Some(subject) = &message.metadata.subject
            && subject != &envelope.event_name
        {
            warn!(
                queue = %self.queue.queue_name(),
                message_id = %message.message_id,
                subject = %subject,
                event = %envelope.event_name,
                "message subject does not match envelope, using envelope"
            );
        }
        let event = EnvelopeCodec::decode_envelope(&envelope, self.dispatcher.registry())?;
        Ok(self.dispatcher.dispatch(&event).await?)
    }
}

#[async_trait]
impl MessageProcessor for CallbackProcessor {
    async fn on_message(&self, message: ReceivedMessage) -> Result<(), ConsumerError> {
        let queue = self.queue.queue_name();
        let outcome = self.process(&message).await;

        if let Err(err) = &outcome {
            error!(
                queue = %queue,
                message_id = %message.message_id,
                dequeue_count = message.dequeue_count,
                body = %message.body_lossy(),
                error = %err,
                "unable to process message"
            );
        }

        match self.policy.settle(outcome.as_ref().map(|_| ()), message.dequeue_count) {
            Settlement::Delete => self.queue.complete(&message).await?,
            Settlement::Release => {
                debug!(queue = %queue, message_id = %message.message_id, "abandoning message for redelivery");
                self.queue.abandon(&message).await?
            }
            Settlement::DeadLetter => {
                if let Err(err) = &outcome {
                    forward_to_dead_letter(self.dead_letter.as_ref(), queue, &message, err).await;
                }
                self.queue.complete(&message).await?
            }
        }
        Ok(())
    }

    async fn on_error(&self, error: TransportError) {
        error!(queue = %self.queue.queue_name(), error = %error, "push transport reported an error");
        debug!(queue = %self.queue.queue_name(), detail = ?error, "transport error detail");
    }
}
