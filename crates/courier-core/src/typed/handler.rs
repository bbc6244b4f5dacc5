//! Handler trait and its type-erased invoker.

use std::any::{Any, TypeId, type_name};
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{DecodedEvent, Event};

/// Handles one event type.
///
/// A single handler type may implement `Handler` for several events and be
/// subscribed to each of them.
///
/// ```ignore
/// struct AcceptEventHandler;
///
/// #[async_trait]
/// impl Handler<AcceptEvent> for AcceptEventHandler {
///     async fn handle(&self, event: &AcceptEvent) -> anyhow::Result<()> {
///         tracing::info!(transaction_id = %event.transaction_id, "accepted");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<E: Event>: Send + Sync + 'static {
    async fn handle(&self, event: &E) -> anyhow::Result<()>;
}

/// Identity of a handler type, used to resolve instances from a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    type_id: TypeId,
    name: &'static str,
}

impl HandlerKey {
    pub fn of<H: Any>() -> Self {
        Self {
            type_id: TypeId::of::<H>(),
            name: short_type_name(type_name::<H>()),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// `my_app::handlers::AcceptEventHandler` -> `AcceptEventHandler`.
/// Generic arguments are left alone.
fn short_type_name(full: &'static str) -> &'static str {
    let end = full.find('<').unwrap_or(full.len());
    match full[..end].rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

/// Object-safe bridge between an erased handler instance and an erased event.
#[async_trait]
pub(crate) trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        handler: Arc<dyn Any + Send + Sync>,
        event: &DecodedEvent,
    ) -> anyhow::Result<()>;
}

pub(crate) struct TypedInvoker<E, H> {
    _marker: PhantomData<fn() -> (E, H)>,
}

impl<E, H> TypedInvoker<E, H> {
    pub(crate) fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Event, H: Handler<E>> Invoker for TypedInvoker<E, H> {
    async fn invoke(
        &self,
        handler: Arc<dyn Any + Send + Sync>,
        event: &DecodedEvent,
    ) -> anyhow::Result<()> {
        let handler = handler.downcast::<H>().map_err(|_| {
            anyhow::anyhow!(
                "scope resolved a different type for handler {}",
                type_name::<H>()
            )
        })?;
        let event = event.downcast_ref::<E>().ok_or_else(|| {
            anyhow::anyhow!(
                "event '{}' decoded as {} but handler expects {}",
                event.name(),
                event.type_name(),
                E::TYPE_NAME
            )
        })?;
        handler.handle(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct PingEvent {
        n: u32,
    }

    impl Event for PingEvent {
        const TYPE_NAME: &'static str = "PingEvent";
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct PongEvent;

    impl Event for PongEvent {
        const TYPE_NAME: &'static str = "PongEvent";
    }

    #[derive(Default)]
    struct Counter {
        total: AtomicUsize,
    }

    #[async_trait]
    impl Handler<PingEvent> for Counter {
        async fn handle(&self, event: &PingEvent) -> anyhow::Result<()> {
            self.total.fetch_add(event.n as usize, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_handler_key_uses_short_name() {
        let key = HandlerKey::of::<Counter>();
        assert_eq!(key.name(), "Counter");
        assert_eq!(key, HandlerKey::of::<Counter>());
        assert_ne!(key.type_id(), TypeId::of::<PingEvent>());
    }

    #[test]
    fn test_short_type_name_keeps_generics() {
        assert_eq!(short_type_name("a::b::Wrapper<c::D>"), "Wrapper<c::D>");
        assert_eq!(short_type_name("Plain"), "Plain");
    }

    #[tokio::test]
    async fn test_typed_invoker_downcasts_and_calls_handler() {
        let counter = Arc::new(Counter::default());
        let invoker = TypedInvoker::<PingEvent, Counter>::new();

        invoker
            .invoke(counter.clone(), &DecodedEvent::new(PingEvent { n: 3 }))
            .await
            .unwrap();

        assert_eq!(counter.total.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_typed_invoker_rejects_wrong_event_type() {
        let invoker = TypedInvoker::<PingEvent, Counter>::new();
        let err = invoker
            .invoke(Arc::new(Counter::default()), &DecodedEvent::new(PongEvent))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("handler expects PingEvent"));
    }

    #[tokio::test]
    async fn test_typed_invoker_rejects_wrong_handler_instance() {
        let invoker = TypedInvoker::<PingEvent, Counter>::new();
        let not_a_counter: Arc<dyn Any + Send + Sync> = Arc::new(42_u8);
        let err = invoker
            .invoke(not_a_counter, &DecodedEvent::new(PingEvent { n: 1 }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("scope resolved a different type"));
    }
}
