//! Ports - seams to the outside world
//!
//! The queue itself and the handler container are collaborators the engine
//! only talks to through these traits. `impls` has in-memory versions.

pub mod handler_factory;
pub mod queue;

pub use self::handler_factory::{HandlerFactory, HandlerScope};
pub use self::queue::{MessageProcessor, PollQueue, PushQueue, QueueSender};
