//! Error types, one enum per failure domain.
//!
//! Registration and configuration errors are fatal at startup. Everything a
//! consumer hits while processing a single message is logged and settled
//! instead of propagated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler {handler} already registered for event '{event}'")]
    DuplicateSubscription { event: String, handler: &'static str },

    #[error("event '{event}' is already bound to {existing}, refusing to rebind it to {attempted}")]
    ConflictingEventType {
        event: String,
        existing: &'static str,
        attempted: &'static str,
    },

    #[error("no subscription for event '{0}'")]
    UnknownEvent(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("no registered event type for event name '{0}'")]
    UnresolvableEventType(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("failed to serialize event {event}: {source}")]
    Serialize {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("queue '{0}' does not exist")]
    QueueNotFound(String),

    #[error("message {0} not found")]
    MessageNotFound(String),

    #[error("receipt does not match the current delivery of message {0}")]
    ReceiptMismatch(String),

    #[error("no message processor is bound to queue '{0}'")]
    NotBound(String),

    #[error("a message processor is already bound to queue '{0}'")]
    AlreadyBound(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// One failed handler invocation.
#[derive(Debug)]
pub struct HandlerFailure {
    pub handler: &'static str,
    pub error: anyhow::Error,
}

impl std::fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:#}", self.handler, self.error)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler failed for event '{event}': {failure}")]
    HandlerFailed { event: String, failure: HandlerFailure },

    #[error("{count} handler(s) failed for event '{event}': {joined}", count = .failures.len(), joined = join_failures(.failures))]
    HandlersFailed {
        event: String,
        failures: Vec<HandlerFailure>,
    },
}

fn join_failures(failures: &[HandlerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Anything that can go wrong between receiving a body and finishing dispatch.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ProcessingError {
    /// Codec failures will fail the same way on every redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessingError::Dispatch(_))
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("consumer for queue '{0}' is already running")]
    AlreadyRunning(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
