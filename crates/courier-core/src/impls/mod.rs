//! Impls - in-memory implementations of the ports
//!
//! Good enough for development, tests and the CLI samples. Production
//! deployments bring their own queue client and handler container.

pub mod container;
pub mod inmem_push;
pub mod inmem_queue;

pub use self::container::HandlerContainer;
pub use self::inmem_push::InMemoryPushQueue;
pub use self::inmem_queue::{DEFAULT_VISIBILITY_TIMEOUT, InMemoryQueue};
