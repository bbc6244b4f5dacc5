//! HandlerContainer - a small scoped handler factory
//!
//! Register how to build each handler type; every scope builds instances
//! lazily and caches them for its own lifetime only.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::ports::{HandlerFactory, HandlerScope};
use crate::typed::HandlerKey;

type Constructor = Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>;

#[derive(Default, Clone)]
pub struct HandlerContainer {
    constructors: HashMap<TypeId, Constructor>,
}

impl HandlerContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh `H` in every scope. Replaces any earlier registration.
    pub fn provide<H, F>(&mut self, constructor: F) -> &mut Self
    where
        H: Send + Sync + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.constructors.insert(
            TypeId::of::<H>(),
            Arc::new(move || Arc::new(constructor()) as Arc<dyn Any + Send + Sync>),
        );
        self
    }

    /// Hand out the same `H` to every scope.
    pub fn provide_shared<H>(&mut self, instance: Arc<H>) -> &mut Self
    where
        H: Send + Sync + 'static,
    {
        self.constructors.insert(
            TypeId::of::<H>(),
            Arc::new(move || instance.clone() as Arc<dyn Any + Send + Sync>),
        );
        self
    }

    pub fn contains(&self, handler: &HandlerKey) -> bool {
        self.constructors.contains_key(&handler.type_id())
    }
}

impl HandlerFactory for HandlerContainer {
    fn create_scope(&self) -> Box<dyn HandlerScope> {
        Box::new(ContainerScope {
            constructors: self.constructors.clone(),
            instances: HashMap::new(),
        })
    }
}

struct ContainerScope {
    constructors: HashMap<TypeId, Constructor>,
    instances: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl HandlerScope for ContainerScope {
    fn resolve(&mut self, handler: &HandlerKey) -> Option<Arc<dyn Any + Send + Sync>> {
        let type_id = handler.type_id();
        if let Some(instance) = self.instances.get(&type_id) {
            return Some(instance.clone());
        }
        let instance = (self.constructors.get(&type_id)?)();
        self.instances.insert(type_id, instance.clone());
        Some(instance)
    }
}
