//! EnvelopeCodec - event <-> envelope bytes
//!
//! Encoding needs only the static type. Decoding goes through the registry:
//! the outer envelope names the event, the registry supplies the concrete
//! type, and only then is `data` deserialized.

use super::registry::SubscriptionRegistry;
use crate::domain::{DecodedEvent, Event, EventEnvelope};
use crate::error::CodecError;

pub struct EnvelopeCodec;

impl EnvelopeCodec {
    pub fn envelope<E: Event>(event: &E) -> Result<EventEnvelope, CodecError> {
        let data = serde_json::to_string(event).map_err(|source| CodecError::Serialize {
            event: E::TYPE_NAME,
            source,
        })?;
        Ok(EventEnvelope::new(E::event_name(), data))
    }

    pub fn encode<E: Event>(event: &E) -> Result<Vec<u8>, CodecError> {
        Self::envelope(event).map(|env| env.to_bytes())
    }

    pub fn decode(bytes: &[u8], registry: &SubscriptionRegistry) -> Result<DecodedEvent, CodecError> {
        let envelope = EventEnvelope::from_bytes(bytes)?;
        Self::decode_envelope(&envelope, registry)
    }

    pub fn decode_envelope(
        envelope: &EventEnvelope,
        registry: &SubscriptionRegistry,
    ) -> Result<DecodedEvent, CodecError> {
        let event_type = registry
            .resolve_event_type(&envelope.event_name)
            .ok_or_else(|| CodecError::UnresolvableEventType(envelope.event_name.clone()))?;

        event_type.decode(&envelope.data).map_err(|e| {
            CodecError::MalformedPayload(format!(
                "data of '{}' does not match {}: {e}",
                envelope.event_name,
                event_type.type_name()
            ))
        })
    }
}
