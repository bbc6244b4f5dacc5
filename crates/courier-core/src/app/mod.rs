//! App - the engine proper
//!
//! - **dispatcher**: decoded event -> subscribed handlers
//! - **sender**: typed event -> queue
//! - **poll_consumer** / **push_consumer**: queue -> dispatcher -> settlement
//! - **backoff**, **settlement**: policies the consumers share
//! - **builder**: startup wiring

pub mod backoff;
pub mod builder;
pub mod dispatcher;
pub mod poll_consumer;
pub mod push_consumer;
pub mod sender;
pub mod settlement;

pub use self::backoff::Backoff;
pub use self::builder::{BuildError, Engine, EngineBuilder};
pub use self::dispatcher::{DispatchReport, HandlerDispatcher, HandlerFailureMode};
pub use self::poll_consumer::{PollConsumer, PollOptions};
pub use self::push_consumer::{ConsumerState, PushConsumer, PushOptions};
pub use self::sender::Sender;
pub use self::settlement::{FailurePolicy, Settlement};
