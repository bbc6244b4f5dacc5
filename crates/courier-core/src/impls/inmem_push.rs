//! InMemoryPushQueue - push transport on top of `InMemoryQueue`
//!
//! `bind` starts a pump task that receives one message at a time and hands
//! it to the bound processor on its own task. A semaphore caps how many
//! callbacks run at once (`max_concurrent_calls`). `unbind` stops the pump
//! and waits for every in-flight callback before returning.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::InMemoryQueue;
use crate::domain::{OutgoingMessage, ReceivedMessage};
use crate::error::TransportError;
use crate::ports::{MessageProcessor, PollQueue, PushQueue, QueueSender};

/// How long an idle pump waits before looking for redelivered messages.
const IDLE_WAIT: Duration = Duration::from_millis(50);

struct Binding {
    token: CancellationToken,
    pump: JoinHandle<()>,
}

pub struct InMemoryPushQueue {
    queue: Arc<InMemoryQueue>,
    max_concurrent_calls: usize,
    binding: Mutex<Option<Binding>>,
}

impl InMemoryPushQueue {
    /// `max_concurrent_calls` of zero is treated as one.
    pub fn new(queue: Arc<InMemoryQueue>, max_concurrent_calls: usize) -> Self {
        Self {
            queue,
            max_concurrent_calls: max_concurrent_calls.max(1),
            binding: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &Arc<InMemoryQueue> {
        &self.queue
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    pub async fn is_bound(&self) -> bool {
        self.binding.lock().await.is_some()
    }
}

#[async_trait]
impl QueueSender for InMemoryPushQueue {
    fn queue_name(&self) -> &str {
        self.queue.queue_name()
    }

    async fn create_if_absent(&self) -> Result<(), TransportError> {
        self.queue.create_if_absent().await
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), TransportError> {
        self.queue.send(message).await
    }
}

#[async_trait]
impl PushQueue for InMemoryPushQueue {
    async fn bind(&self, processor: Arc<dyn MessageProcessor>) -> Result<(), TransportError> {
        let mut binding = self.binding.lock().await;
        if binding.is_some() {
            return Err(TransportError::AlreadyBound(self.queue_name().to_string()));
        }

        let token = CancellationToken::new();
        let pump = tokio::spawn(pump(
            self.queue.clone(),
            processor,
            Arc::new(Semaphore::new(self.max_concurrent_calls)),
            token.clone(),
        ));
        *binding = Some(Binding { token, pump });
        info!(queue = %self.queue_name(), max_concurrent_calls = self.max_concurrent_calls, "processor bound");
        Ok(())
    }

    async fn unbind(&self) -> Result<(), TransportError> {
        let Some(Binding { token, pump }) = self.binding.lock().await.take() else {
            return Ok(());
        };
        token.cancel();
        if let Err(err) = pump.await {
            error!(queue = %self.queue_name(), error = %err, "message pump panicked");
        }
        info!(queue = %self.queue_name(), "processor unbound");
        Ok(())
    }

    async fn complete(&self, message: &ReceivedMessage) -> Result<(), TransportError> {
        self.queue.delete(message).await
    }

    async fn abandon(&self, message: &ReceivedMessage) -> Result<(), TransportError> {
        self.queue.release(message).await
    }
}

async fn pump(
    queue: Arc<InMemoryQueue>,
    processor: Arc<dyn MessageProcessor>,
    permits: Arc<Semaphore>,
    token: CancellationToken,
) {
    let mut in_flight = JoinSet::new();

    loop {
        let permit = tokio::select! {
            _ = token.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let received = tokio::select! {
            _ = token.cancelled() => break,
            received = queue.receive(1) => received,
        };

        match received {
            Ok(mut batch) if !batch.is_empty() => {
                let message = batch.remove(0);
                let queue = queue.clone();
                let processor = processor.clone();
                in_flight.spawn(async move {
                    let _permit = permit;
                    if let Err(err) = processor.on_message(message.clone()).await {
                        warn!(queue = %queue.queue_name(), message_id = %message.message_id, error = %err, "callback left message unsettled, abandoning");
                        if let Err(err) = queue.release(&message).await {
                            debug!(message_id = %message.message_id, error = %err, "abandon after failed callback did not apply");
                        }
                    }
                });
            }
            Ok(_) => {
                drop(permit);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = queue.wait_for_arrival(IDLE_WAIT) => {}
                }
            }
            Err(err) => {
                drop(permit);
                processor.on_error(err).await;
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_WAIT) => {}
                }
            }
        }

        while let Some(done) = in_flight.try_join_next() {
            if let Err(err) = done {
                error!(queue = %queue.queue_name(), error = %err, "callback task panicked");
            }
        }
    }

    while let Some(done) = in_flight.join_next().await {
        if let Err(err) = done {
            error!(queue = %queue.queue_name(), error = %err, "callback task panicked");
        }
    }
}
