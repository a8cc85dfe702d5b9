use std::sync::{Arc, PoisonError, RwLock};

use crate::info::{ContainerSpec, ContainerStats};

use super::{ContainerName, ContainerReference, Error, Result};

/// Scope of a [`ContainerHandler::list_containers`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListType {
    /// Only the direct children of the container.
    SelfOnly,
    /// Every descendant of the container, flattened.
    Recursive,
}

/// Observes a single container.
///
/// Implementations may block on I/O; callers in async context are expected to
/// move calls onto a blocking thread.
pub trait ContainerHandler: Send + Sync {
    fn list_containers(&self, list_type: ListType) -> Result<Vec<ContainerReference>>;

    fn get_spec(&self) -> Result<ContainerSpec>;

    fn get_stats(&self) -> Result<ContainerStats>;
}

/// Produces [`ContainerHandler`]s for the container names it recognizes.
pub trait ContainerHandlerFactory: Send + Sync {
    /// Human readable name used in log messages.
    fn name(&self) -> &str;

    fn can_handle(&self, name: &ContainerName) -> bool;

    fn new_handler(&self, name: &ContainerName) -> Result<Arc<dyn ContainerHandler>>;
}

/// An explicit registry of handler factories.
///
/// Factories are consulted in registration order; the first one accepting a
/// name produces its handler.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: RwLock<Vec<Arc<dyn ContainerHandlerFactory>>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, factory: Arc<dyn ContainerHandlerFactory>) {
        log::debug!("Registering container handler factory `{}`", factory.name());
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(factory);
    }

    pub fn clear(&self) {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a handler for `name` using the first factory that accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFactory`] if no factory accepts the name, or the error of
    /// the accepting factory if it fails to build the handler.
    pub fn new_handler(&self, name: &ContainerName) -> Result<Arc<dyn ContainerHandler>> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|factory| factory.can_handle(name))
            .cloned()
            .ok_or_else(|| Error::NoFactory(name.to_string()))?;
        log::trace!(
            "Factory `{}` accepted container `{}`",
            factory.name(),
            name
        );
        factory.new_handler(name)
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let factories = self.factories.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_list()
            .entries(factories.iter().map(|factory| factory.name()))
            .finish()
    }
}
