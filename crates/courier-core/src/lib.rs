//! courier-core
//!
//! In-process event dispatch over a message queue: typed events go out
//! through a [`Sender`], come back through a push or poll consumer, and are
//! routed by name to every subscribed handler.
//!
//! # Modules
//! - **domain**: events, the wire envelope, queue messages and ids
//! - **typed**: `Handler<E>`, the subscription registry and the envelope codec
//! - **ports**: queue and handler-factory traits
//! - **app**: dispatcher, sender, consumers, failure policy, builder
//! - **impls**: in-memory queues and a scoped handler container
//! - **config**: `MessagingOptions`
//! - **error**: error enums

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{
    Engine, EngineBuilder, FailurePolicy, HandlerDispatcher, HandlerFailureMode, PollConsumer,
    PollOptions, PushConsumer, PushOptions, Sender,
};
pub use config::MessagingOptions;
pub use domain::{Event, MessageId};
pub use typed::{Handler, SubscriptionRegistry};
