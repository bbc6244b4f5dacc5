//! Event - typed payloads carried over the queue
//!
//! An event is plain data. Its full type name (for example `AcceptEvent`) is
//! declared once on the type; the routing key used on the wire is that name
//! with the `Event` suffix stripped (`Accept`).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Suffix removed from type names to form the routing key.
pub const EVENT_SUFFIX: &str = "Event";

/// Event ties a routing key to a concrete serde type.
///
/// Fields go over the wire in camelCase, so implementors should declare
/// `#[serde(rename_all = "camelCase")]`:
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct AcceptEvent {
///     transaction_id: String,
/// }
///
/// impl Event for AcceptEvent {
///     const TYPE_NAME: &'static str = "AcceptEvent";
/// }
/// ```
pub trait Event: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Full type name, including the `Event` suffix if the type follows the
    /// naming convention.
    const TYPE_NAME: &'static str;

    /// Routing key carried in the envelope's `eventName`.
    fn event_name() -> &'static str {
        event_key(Self::TYPE_NAME)
    }
}

/// Strip the `Event` suffix. Names without the suffix are used unchanged, and
/// a bare `"Event"` is kept as is rather than collapsing to an empty key.
pub fn event_key(type_name: &'static str) -> &'static str {
    match type_name.strip_suffix(EVENT_SUFFIX) {
        Some(key) if !key.is_empty() => key,
        _ => type_name,
    }
}

/// An event decoded from the wire, type-erased until a handler downcasts it.
#[derive(Clone)]
pub struct DecodedEvent {
    name: String,
    type_name: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl DecodedEvent {
    pub fn new<E: Event>(event: E) -> Self {
        Self {
            name: E::event_name().to_string(),
            type_name: E::TYPE_NAME,
            payload: Arc::new(event),
        }
    }

    /// Routing key.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    pub fn is<E: Event>(&self) -> bool {
        self.payload.is::<E>()
    }
}

impl fmt::Debug for DecodedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedEvent")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct AcceptEvent {
        transaction_id: String,
    }

    impl Event for AcceptEvent {
        const TYPE_NAME: &'static str = "AcceptEvent";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shipped;

    impl Event for Shipped {
        const TYPE_NAME: &'static str = "Shipped";
    }

    #[rstest]
    #[case("AcceptEvent", "Accept")]
    #[case("OrderPlacedEvent", "OrderPlaced")]
    #[case("Shipped", "Shipped")]
    #[case("EventSourcedEvent", "EventSourced")]
    #[case("Event", "Event")]
    fn test_event_key_strips_suffix(#[case] type_name: &'static str, #[case] expected: &str) {
        assert_eq!(event_key(type_name), expected);
    }

    #[test]
    fn test_event_name_uses_suffix_convention() {
        assert_eq!(AcceptEvent::event_name(), "Accept");
        assert_eq!(Shipped::event_name(), "Shipped");
    }

    #[test]
    fn test_decoded_event_downcasts_only_to_its_own_type() {
        let decoded = DecodedEvent::new(AcceptEvent {
            transaction_id: "abc".into(),
        });

        assert_eq!(decoded.name(), "Accept");
        assert_eq!(decoded.type_name(), "AcceptEvent");
        assert!(decoded.is::<AcceptEvent>());
        assert!(decoded.downcast_ref::<Shipped>().is_none());
        assert_eq!(
            decoded.downcast_ref::<AcceptEvent>().unwrap().transaction_id,
            "abc"
        );
    }
}
