//! HandlerFactory port - where handler instances come from.
//!
//! The dispatcher opens one scope per message and resolves every subscribed
//! handler from it, so scoped dependencies (a db transaction, a request
//! context) never leak between messages. Dropping the scope releases it.

use std::any::Any;
use std::sync::Arc;

use crate::typed::HandlerKey;

pub trait HandlerFactory: Send + Sync {
    fn create_scope(&self) -> Box<dyn HandlerScope>;
}

pub trait HandlerScope: Send {
    /// `None` when nothing is registered for the handler type, which is a
    /// deployment problem; the dispatcher skips the handler with a warning.
    fn resolve(&mut self, handler: &HandlerKey) -> Option<Arc<dyn Any + Send + Sync>>;
}
