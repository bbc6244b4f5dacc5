//! PollConsumer - fetch, dispatch and settle on a self-tuning interval
//!
//! # Loop
//! 1. `receive(max_batch_size)`
//! 2. messages: reset the backoff, then process and settle each one in turn
//! 3. nothing (or a receive error): sleep the current wait, double it
//!
//! Cancellation is checked at the top of every iteration and interrupts any
//! sleep. A message already being dispatched is finished first.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::backoff::{Backoff, DEFAULT_MAX_POLL_INTERVAL};
use super::dispatcher::HandlerDispatcher;
use super::settlement::{FailurePolicy, Settlement, forward_to_dead_letter};
use crate::config::MessagingOptions;
use crate::domain::ReceivedMessage;
use crate::error::ConsumerError;
use crate::ports::{PollQueue, QueueSender};

#[derive(Debug, Clone)]
pub struct PollOptions {
    /// At least 1.
    pub max_batch_size: usize,
    /// Longest idle sleep. Below 100ms it also replaces the initial wait.
    pub max_polling_interval: Duration,
    pub inter_message_delay: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_batch_size: 1,
            max_polling_interval: DEFAULT_MAX_POLL_INTERVAL,
            inter_message_delay: Duration::ZERO,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl From<&MessagingOptions> for PollOptions {
    fn from(options: &MessagingOptions) -> Self {
        Self {
            max_batch_size: options.max_batch_size,
            max_polling_interval: options.max_polling_interval(),
            inter_message_delay: options.inter_message_delay(),
            failure_policy: options.failure_policy,
        }
    }
}

pub struct PollConsumer {
    queue: Arc<dyn PollQueue>,
    dispatcher: Arc<HandlerDispatcher>,
    options: PollOptions,
    dead_letter: Option<Arc<dyn QueueSender>>,
}

impl PollConsumer {
    /// `max_batch_size` of zero is treated as one.
    pub fn new(queue: Arc<dyn PollQueue>, dispatcher: Arc<HandlerDispatcher>, mut options: PollOptions) -> Self {
        options.max_batch_size = options.max_batch_size.max(1);
        Self {
            queue,
            dispatcher,
            options,
            dead_letter: None,
        }
    }

    /// Where `Settlement::DeadLetter` forwards messages.
    pub fn with_dead_letter(mut self, target: Arc<dyn QueueSender>) -> Self {
        self.dead_letter = Some(target);
        self
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Run until `token` is cancelled. Only queue creation can fail; every
    /// error after that is logged and the loop keeps going.
    pub async fn run(&self, token: CancellationToken) -> Result<(), ConsumerError> {
        let queue = self.queue.queue_name().to_string();
        self.queue.create_if_absent().await?;
        info!(queue = %queue, max_batch_size = self.options.max_batch_size, "poll consumer started");

        let mut backoff = Backoff::new(self.options.max_polling_interval);

        while !token.is_cancelled() {
            debug!(queue = %queue, "checking for new messages");
            let received = tokio::select! {
                _ = token.cancelled() => break,
                received = self.queue.receive(self.options.max_batch_size) => received,
            };

            let batch = match received {
                Ok(batch) => batch,
                Err(err) => {
                    error!(queue = %queue, error = %err, "receive failed");
                    Vec::new()
                }
            };

            if batch.is_empty() {
                let wait = backoff.next_wait();
                debug!(queue = %queue, wait_ms = wait.as_millis() as u64, "no new messages, backing off");
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                continue;
            }

            backoff.reset();
            debug!(queue = %queue, count = batch.len(), "processing batch");
            let last = batch.len() - 1;
            for (index, message) in batch.into_iter().enumerate() {
                self.handle(message).await;
                if index < last && !self.options.inter_message_delay.is_zero() {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.options.inter_message_delay) => {}
                    }
                }
            }
        }

        info!(queue = %queue, "poll consumer stopped");
        Ok(())
    }

    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<Result<(), ConsumerError>> {
        tokio::spawn(async move { self.run(token).await })
    }

    async fn handle(&self, message: ReceivedMessage) {
        let queue = self.queue.queue_name();
        let outcome = self.dispatcher.process(&message.body).await;

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

        let settlement = self
            .options
            .failure_policy
            .settle(outcome.as_ref().map(|_| ()), message.dequeue_count);

        match settlement {
            Settlement::Release => {
                debug!(queue = %queue, message_id = %message.message_id, "leaving message for redelivery");
                return;
            }
            Settlement::DeadLetter => {
                if let Err(err) = &outcome {
                    forward_to_dead_letter(self.dead_letter.as_ref(), queue, &message, err).await;
                }
            }
            Settlement::Delete => {}
        }

        if let Err(err) = self.queue.delete(&message).await {
            error!(queue = %queue, message_id = %message.message_id, error = %err, "failed to delete message");
        }
    }
}
