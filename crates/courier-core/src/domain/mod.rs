//! Domain model: events, the wire envelope, queue messages and their ids.

pub mod envelope;
pub mod event;
pub mod ids;
pub mod message;

pub use self::envelope::EventEnvelope;
pub use self::event::{DecodedEvent, EVENT_SUFFIX, Event, event_key};
pub use self::ids::{MessageId, Receipt};
pub use self::message::{MessageMetadata, OutgoingMessage, ReceivedMessage};
