//! EngineBuilder - startup wiring and fail-fast validation
//!
//! ```ignore
//! let engine = EngineBuilder::new()
//!     .subscribe::<AcceptEvent, AcceptHandler>()?
//!     .expect_events(&["Accept"])
//!     .build(Arc::new(container))?;
//! let consumer = engine.poll_consumer(queue, PollOptions::default());
//! ```
//!
//! `build` freezes the registry. After that it is only shared read-only.

use std::sync::Arc;

use thiserror::Error;

use super::dispatcher::{HandlerDispatcher, HandlerFailureMode};
use super::poll_consumer::{PollConsumer, PollOptions};
use super::push_consumer::{PushConsumer, PushOptions};
use super::sender::Sender;
use crate::domain::Event;
use crate::error::RegistryError;
use crate::ports::{HandlerFactory, PollQueue, PushQueue, QueueSender};
use crate::typed::{Handler, SubscriptionRegistry};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("missing event types: {0:?}; these events were expected but nothing subscribes to them")]
    MissingEventTypes(Vec<String>),
}

#[derive(Default)]
pub struct EngineBuilder {
    registry: SubscriptionRegistry,
    expected_events: Option<Vec<String>>,
    handler_mode: HandlerFailureMode,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<E: Event, H: Handler<E>>(mut self) -> Result<Self, BuildError> {
        self.registry.register::<E, H>()?;
        Ok(self)
    }

    /// Event names (routing keys, not type names) that must have at least one
    /// subscriber by `build`.
    pub fn expect_events(mut self, events: &[&str]) -> Self {
        self.expected_events = Some(events.iter().map(|e| e.to_string()).collect());
        self
    }

    pub fn handler_mode(mut self, mode: HandlerFailureMode) -> Self {
        self.handler_mode = mode;
        self
    }

    pub fn build(self, factory: Arc<dyn HandlerFactory>) -> Result<Engine, BuildError> {
        if let Some(expected) = &self.expected_events {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.registry.has_subscription(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingEventTypes(missing));
            }
        }

        let registry = Arc::new(self.registry);
        tracing::info!(
            events = ?registry.registered_events(),
            subscriptions = registry.len(),
            "completed event handler registration"
        );
        let dispatcher = Arc::new(HandlerDispatcher::new(registry.clone(), factory, self.handler_mode));
        Ok(Engine {
            registry,
            dispatcher,
        })
    }
}

/// Frozen registry plus the dispatcher every consumer shares.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<HandlerDispatcher>,
}

impl Engine {
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<HandlerDispatcher> {
        &self.dispatcher
    }

    pub fn sender(&self, queue: Arc<dyn QueueSender>) -> Sender {
        Sender::new(queue)
    }

    pub fn poll_consumer(&self, queue: Arc<dyn PollQueue>, options: PollOptions) -> PollConsumer {
        PollConsumer::new(queue, self.dispatcher.clone(), options)
    }

    pub fn push_consumer(&self, queue: Arc<dyn PushQueue>, options: PushOptions) -> PushConsumer {
        PushConsumer::new(queue, self.dispatcher.clone(), options)
    }
}
