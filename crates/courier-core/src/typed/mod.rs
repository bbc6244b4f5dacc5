//! Typed - compile-time wiring of event types to handlers
//!
//! Two layers, as usual for type erasure:
//! - **typed surface**: `Event`, `Handler<E>` - what applications implement;
//! - **erased core**: `Subscription` holding an invoker that downcasts the
//!   decoded event and the resolved handler back to their concrete types.

pub mod codec;
pub mod handler;
pub mod registry;

pub use self::codec::EnvelopeCodec;
pub use self::handler::{Handler, HandlerKey};
pub use self::registry::{EventType, Subscription, SubscriptionRegistry};
