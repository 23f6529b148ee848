use std::any::TypeId;
use std::sync::Arc;

use async_trait::async_trait;

use crate::container::descriptor::ServiceKey;
use crate::container::registration::{downcast, AnyArc};
use crate::errors::InjectorError;

/// Chain of services under construction on one call path.
///
/// Stacks are never mutated in place: every nested resolution receives an
/// extended copy, so sibling branches of the graph never see each other's
/// in-flight services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStack {
    services: Vec<ServiceKey>,
}

impl ResolutionStack {
    /// Create an empty stack for a top-level resolution
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this stack with `key` pushed on top
    pub fn descend(&self, key: ServiceKey) -> Self {
        let mut services = Vec::with_capacity(self.services.len() + 1);
        services.extend_from_slice(&self.services);
        services.push(key);
        Self { services }
    }

    /// Check if the stack contains a service (for cycle detection)
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.services.contains(key)
    }

    /// The service whose constructor is currently running
    pub fn requester(&self) -> Option<&ServiceKey> {
        self.services.last()
    }

    pub fn services(&self) -> &[ServiceKey] {
        &self.services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// The whole stack with `key` appended, as reported for a cycle
    pub fn cycle_with(&self, key: &ServiceKey) -> Vec<ServiceKey> {
        let mut chain = self.services.clone();
        chain.push(key.clone());
        chain
    }

    /// Get the path as a string for error messages
    pub fn path_string(&self) -> String {
        self.services
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Resolution surface shared by the injector and the contexts handed to
/// constructors.
///
/// Not dyn compatible because of the generic methods; implementors supply
/// the erased primitives and get the typed API for free.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve a key through the synchronous path
    fn resolve_key(&self, key: &ServiceKey) -> Result<AnyArc, InjectorError>;

    /// Resolve a key through the asynchronous path
    async fn resolve_key_async(&self, key: &ServiceKey) -> Result<AnyArc, InjectorError>;

    /// Whether `key` is bound and resolvable synchronously
    fn contains_key(&self, key: &ServiceKey) -> bool;

    /// Whether `key` is bound at all
    fn contains_key_async(&self, key: &ServiceKey) -> bool;

    /// Keys bound to `type_id`, in registration order
    fn keys_for(&self, type_id: TypeId, include_async: bool) -> Vec<ServiceKey>;

    /// Resolve a service by type
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectorError> {
        self.get_by_key::<T>(&ServiceKey::of::<T>())
    }

    /// Resolve a named service
    fn get_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, InjectorError> {
        self.get_by_key::<T>(&ServiceKey::named::<T>(name))
    }

    /// Resolve a service by explicit key
    fn get_by_key<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &ServiceKey,
    ) -> Result<Arc<T>, InjectorError> {
        let value = self.resolve_key(key)?;
        downcast::<T>(key, &value)
    }

    /// Resolve a service, returning `None` only when that exact service is
    /// not bound. Failures deeper in the graph still surface as errors.
    fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, InjectorError> {
        let key = ServiceKey::of::<T>();
        match self.get_by_key::<T>(&key) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.missing_key() == Some(&key) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Named variant of [`Resolver::try_get`]
    fn try_get_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<T>>, InjectorError> {
        let key = ServiceKey::named::<T>(name);
        match self.get_by_key::<T>(&key) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.missing_key() == Some(&key) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Resolve a service by type through the asynchronous path
    async fn get_async<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectorError> {
        let key = ServiceKey::of::<T>();
        let value = self.resolve_key_async(&key).await?;
        downcast::<T>(&key, &value)
    }

    /// Resolve a named service through the asynchronous path
    async fn get_async_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, InjectorError> {
        let key = ServiceKey::named::<T>(name);
        let value = self.resolve_key_async(&key).await?;
        downcast::<T>(&key, &value)
    }

    /// Check if a service can be resolved with [`Resolver::get`]
    fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.contains_key(&ServiceKey::of::<T>())
    }

    fn contains_named<T: ?Sized + 'static>(&self, name: &str) -> bool {
        self.contains_key(&ServiceKey::named::<T>(name))
    }

    /// Check if a service can be resolved with [`Resolver::get_async`]
    fn contains_async<T: ?Sized + 'static>(&self) -> bool {
        self.contains_key_async(&ServiceKey::of::<T>())
    }

    fn contains_async_named<T: ?Sized + 'static>(&self, name: &str) -> bool {
        self.contains_key_async(&ServiceKey::named::<T>(name))
    }

    /// Every synchronously resolvable service bound to `T`, named or not,
    /// each resolved through the normal `get` path
    fn all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, InjectorError> {
        self.keys_for(TypeId::of::<T>(), false)
            .iter()
            .map(|key| self.get_by_key::<T>(key))
            .collect()
    }

    /// Like [`Resolver::all`], but also includes async-only bindings
    async fn all_async<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Vec<Arc<T>>, InjectorError> {
        let mut services = Vec::new();
        for key in self.keys_for(TypeId::of::<T>(), true) {
            let value = self.resolve_key_async(&key).await?;
            services.push(downcast::<T>(&key, &value)?);
        }
        Ok(services)
    }
}
