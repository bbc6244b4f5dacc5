//! SubscriptionRegistry - event name -> (concrete type, ordered handlers)
//!
//! Built during startup (mutable), then shared behind an `Arc` and only read
//! while consumers run. Reads need no locking.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::handler::{Handler, HandlerKey, Invoker, TypedInvoker};
use crate::domain::{DecodedEvent, Event};
use crate::error::RegistryError;

type DecodeFn = fn(&str) -> Result<DecodedEvent, serde_json::Error>;

fn decode_as<E: Event>(data: &str) -> Result<DecodedEvent, serde_json::Error> {
    serde_json::from_str::<E>(data).map(DecodedEvent::new)
}

/// Concrete type registered under an event name.
#[derive(Clone, Copy)]
pub struct EventType {
    type_id: TypeId,
    type_name: &'static str,
    decode: DecodeFn,
}

impl EventType {
    fn of<E: Event>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: E::TYPE_NAME,
            decode: decode_as::<E>,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Deserialize the envelope's `data` into this type.
    pub fn decode(&self, data: &str) -> Result<DecodedEvent, serde_json::Error> {
        (self.decode)(data)
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventType")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// One handler type subscribed to one event.
#[derive(Clone)]
pub struct Subscription {
    handler: HandlerKey,
    invoker: Arc<dyn Invoker>,
}

impl Subscription {
    pub fn handler(&self) -> &HandlerKey {
        &self.handler
    }

    pub(crate) fn invoker(&self) -> &Arc<dyn Invoker> {
        &self.invoker
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("handler", &self.handler.name())
            .finish()
    }
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    event_types: HashMap<String, EventType>,
    handlers: HashMap<String, Vec<Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe handler type `H` to event `E`.
    ///
    /// Fails if the pair is already registered, or if another concrete type
    /// already owns `E`'s event name.
    pub fn register<E: Event, H: Handler<E>>(&mut self) -> Result<(), RegistryError> {
        let name = E::event_name();
        let handler = HandlerKey::of::<H>();

        if let Some(existing) = self.event_types.get(name)
            && existing.type_id != TypeId::of::<E>()
        {
            return Err(RegistryError::ConflictingEventType {
                event: name.to_string(),
                existing: existing.type_name,
                attempted: E::TYPE_NAME,
            });
        }

        let subscribers = self.handlers.entry(name.to_string()).or_default();
        if subscribers.iter().any(|s| s.handler == handler) {
            return Err(RegistryError::DuplicateSubscription {
                event: name.to_string(),
                handler: handler.name(),
            });
        }

        subscribers.push(Subscription {
            handler,
            invoker: Arc::new(TypedInvoker::<E, H>::new()),
        });
        self.event_types
            .entry(name.to_string())
            .or_insert_with(EventType::of::<E>);
        Ok(())
    }

    pub fn resolve_event_type(&self, event_name: &str) -> Option<&EventType> {
        self.event_types.get(event_name)
    }

    /// Handlers in registration order.
    pub fn handlers_for(&self, event_name: &str) -> Result<&[Subscription], RegistryError> {
        self.handlers
            .get(event_name)
            .map(Vec::as_slice)
            .ok_or_else(|| RegistryError::UnknownEvent(event_name.to_string()))
    }

    pub fn has_subscription(&self, event_name: &str) -> bool {
        self.handlers
            .get(event_name)
            .is_some_and(|subs| !subs.is_empty())
    }

    /// Registered event names, sorted.
    pub fn registered_events(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of subscriptions across all events.
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.handlers.iter()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};

    #[test]
    fn test_register_and_resolve() {
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, LedgerHandler>().unwrap();

        assert!(registry.has_subscription("Accept"));
        let ty = registry.resolve_event_type("Accept").unwrap();
        assert_eq!(ty.type_name(), "AcceptEvent");
        assert!(registry.resolve_event_type("AcceptEvent").is_none());
    }

    #[test]
    fn test_duplicate_pair_is_rejected() {
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, LedgerHandler>().unwrap();
        let err = registry.register::<AcceptEvent, LedgerHandler>().unwrap_err();

        assert!(matches!(
            err,
            RegistryError::DuplicateSubscription { ref event, handler }
                if event == "Accept" && handler == "LedgerHandler"
        ));
        assert_eq!(registry.handlers_for("Accept").unwrap().len(), 1);
    }

    #[test]
    fn test_distinct_handlers_kept_in_registration_order() {
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, NotifyHandler>().unwrap();
        registry.register::<AcceptEvent, LedgerHandler>().unwrap();

        let names: Vec<&str> = registry
            .handlers_for("Accept")
            .unwrap()
            .iter()
            .map(|s| s.handler().name())
            .collect();
        assert_eq!(names, vec!["NotifyHandler", "LedgerHandler"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_one_handler_type_for_many_events() {
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, LedgerHandler>().unwrap();
        registry.register::<RejectEvent, LedgerHandler>().unwrap();

        assert_eq!(registry.registered_events(), vec!["Accept", "Reject"]);
    }

    #[test]
    fn test_unknown_event_has_no_handlers() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.has_subscription("Accept"));
        assert!(registry.is_empty());
        assert!(matches!(
            registry.handlers_for("Accept"),
            Err(RegistryError::UnknownEvent(name)) if name == "Accept"
        ));
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct ImpostorAccept {
        amount: u64,
    }

    impl Event for ImpostorAccept {
        const TYPE_NAME: &'static str = "AcceptEvent";
    }

    #[async_trait]
    impl Handler<ImpostorAccept> for NotifyHandler {
        async fn handle(&self, _event: &ImpostorAccept) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_conflicting_concrete_type_is_rejected() {
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, LedgerHandler>().unwrap();
        let err = registry
            .register::<ImpostorAccept, NotifyHandler>()
            .unwrap_err();

        assert!(matches!(err, RegistryError::ConflictingEventType { .. }));
        assert_eq!(registry.handlers_for("Accept").unwrap().len(), 1);
    }

    #[test]
    fn test_event_type_decodes_its_own_shape() {
        let mut registry = SubscriptionRegistry::new();
        registry.register::<AcceptEvent, LedgerHandler>().unwrap();
        let ty = registry.resolve_event_type("Accept").unwrap();

        let decoded = ty.decode(r#"{"transactionId":"t-1"}"#).unwrap();
        assert_eq!(
            decoded.downcast_ref::<AcceptEvent>(),
            Some(&AcceptEvent {
                transaction_id: "t-1".into()
            })
        );
        assert!(ty.decode(r#"{"transaction_id":"t-1"}"#).is_err());
    }
}
