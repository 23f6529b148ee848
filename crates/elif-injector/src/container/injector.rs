use std::any::TypeId;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::container::builder::InjectorBuilder;
use crate::container::cache::{AsyncSingletonCache, SingletonCache};
use crate::container::context::ResolutionContext;
use crate::container::descriptor::ServiceKey;
use crate::container::registration::{AnyArc, Registration, ServiceBindings};
use crate::container::resolver::{ResolutionStack, Resolver};
use crate::errors::InjectorError;

struct InjectorInner {
    id: Uuid,
    /// Frozen at build time
    bindings: ServiceBindings,
    singletons: SingletonCache,
    async_singletons: AsyncSingletonCache,
}

/// Immutable service registry produced by [`InjectorBuilder::build`].
///
/// Cloning is cheap and clones share the same singleton caches.
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Injector {
    /// Start registering services
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    pub(crate) fn from_parts(
        id: Uuid,
        bindings: ServiceBindings,
        singletons: SingletonCache,
        async_singletons: AsyncSingletonCache,
    ) -> Self {
        Self {
            inner: Arc::new(InjectorInner {
                id,
                bindings,
                singletons,
                async_singletons,
            }),
        }
    }

    /// Identifier used to correlate log lines for this injector
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Get the number of registered services
    pub fn service_count(&self) -> usize {
        self.inner.bindings.count()
    }

    /// Get all registered service keys, in registration order
    pub fn registered_services(&self) -> Vec<ServiceKey> {
        self.inner.bindings.keys().cloned().collect()
    }

    /// Registration bound to `key`, if any
    pub fn registration(&self, key: &ServiceKey) -> Option<&Registration> {
        self.inner.bindings.get(key)
    }

    /// Get service statistics
    pub fn get_statistics(&self) -> Result<InjectorStatistics, InjectorError> {
        let mut stats = InjectorStatistics {
            total_services: self.inner.bindings.count(),
            cached_singletons: self.inner.singletons.cached_count()?,
            cached_async_singletons: self.inner.async_singletons.cached_count()?,
            ..InjectorStatistics::default()
        };

        for (_, registration) in self.inner.bindings.iter() {
            match registration {
                Registration::Instance(_) => stats.instances += 1,
                Registration::Factory { .. } => stats.factories += 1,
                Registration::Singleton { .. } => stats.singletons += 1,
                Registration::AsyncFactory { .. } => stats.async_factories += 1,
                Registration::AsyncSingleton { .. } => stats.async_singletons += 1,
            }
        }

        Ok(stats)
    }

    /// Synchronous resolution with the caller's stack.
    pub(crate) fn resolve_with_stack(
        &self,
        key: &ServiceKey,
        stack: &ResolutionStack,
    ) -> Result<AnyArc, InjectorError> {
        let registration = self
            .inner
            .bindings
            .get(key)
            .ok_or_else(|| InjectorError::not_found_in(key, stack))?;

        match registration {
            Registration::Instance(value) => Ok(value.clone()),
            Registration::Factory {
                construct,
                on_create,
            } => {
                let context = self.descend(key, stack)?;
                tracing::trace!(service = %key, depth = stack.len(), "Constructing factory service");

                let value = construct(&context).map_err(|e| e.with_resolution_context(context.stack()))?;
                if let Some(hook) = on_create {
                    hook(&value, &context).map_err(|e| e.with_resolution_context(context.stack()))?;
                }
                Ok(value)
            }
            Registration::Singleton {
                construct,
                on_create,
            } => {
                if let Some(value) = self.inner.singletons.get(key)? {
                    return Ok(value);
                }

                let context = self.descend(key, stack)?;
                let (value, created) = self
                    .inner
                    .singletons
                    .get_or_try_init(key, || construct(&context))
                    .map_err(|e| e.with_resolution_context(context.stack()))?;

                if created {
                    tracing::debug!(injector = %self.inner.id, service = %key, "Constructed singleton");
                    if let Some(hook) = on_create {
                        hook(&value, &context)
                            .map_err(|e| e.with_resolution_context(context.stack()))?;
                    }
                }
                Ok(value)
            }
            Registration::AsyncFactory { .. } | Registration::AsyncSingleton { .. } => {
                self.descend(key, stack)?;
                Err(InjectorError::InvalidSyncAccess { key: key.clone() })
            }
        }
    }

    /// Asynchronous resolution with the caller's stack. Sync registrations
    /// resolve immediately through the synchronous path.
    pub(crate) async fn resolve_async_with_stack(
        &self,
        key: &ServiceKey,
        stack: &ResolutionStack,
    ) -> Result<AnyArc, InjectorError> {
        let registration = self
            .inner
            .bindings
            .get(key)
            .ok_or_else(|| InjectorError::not_found_in(key, stack))?;

        match registration {
            Registration::Instance(value) => Ok(value.clone()),
            Registration::Factory { .. } | Registration::Singleton { .. } => {
                self.resolve_with_stack(key, stack)
            }
            Registration::AsyncFactory {
                construct,
                on_create,
            } => {
                let context = self.descend(key, stack)?;
                tracing::trace!(service = %key, depth = stack.len(), "Constructing async factory service");

                let value = construct(context.clone())
                    .await
                    .map_err(|e| e.with_resolution_context(context.stack()))?;
                if let Some(hook) = on_create {
                    hook(value.clone(), context.clone())
                        .await
                        .map_err(|e| e.with_resolution_context(context.stack()))?;
                }
                Ok(value)
            }
            Registration::AsyncSingleton {
                construct,
                on_create,
            } => {
                if let Some(value) = self.inner.async_singletons.get(key)? {
                    return Ok(value);
                }

                let context = self.descend(key, stack)?;
                let (value, created) = self
                    .inner
                    .async_singletons
                    .get_or_try_init(key, || construct(context.clone()))
                    .await
                    .map_err(|e| e.with_resolution_context(context.stack()))?;

                if created {
                    tracing::debug!(injector = %self.inner.id, service = %key, "Constructed async singleton");
                    if let Some(hook) = on_create {
                        hook(value.clone(), context.clone())
                            .await
                            .map_err(|e| e.with_resolution_context(context.stack()))?;
                    }
                }
                Ok(value)
            }
        }
    }

    /// Cycle check, then a context over the extended stack
    fn descend(
        &self,
        key: &ServiceKey,
        stack: &ResolutionStack,
    ) -> Result<ResolutionContext, InjectorError> {
        if stack.contains(key) {
            return Err(InjectorError::CircularDependency {
                chain: stack.cycle_with(key),
            });
        }
        Ok(ResolutionContext::new(self.clone(), stack.descend(key.clone())))
    }
}

#[async_trait]
impl Resolver for Injector {
    fn resolve_key(&self, key: &ServiceKey) -> Result<AnyArc, InjectorError> {
        self.resolve_with_stack(key, &ResolutionStack::new())
    }

    async fn resolve_key_async(&self, key: &ServiceKey) -> Result<AnyArc, InjectorError> {
        self.resolve_async_with_stack(key, &ResolutionStack::new())
            .await
    }

    fn contains_key(&self, key: &ServiceKey) -> bool {
        self.inner
            .bindings
            .get(key)
            .map_or(false, |registration| !registration.is_async())
    }

    fn contains_key_async(&self, key: &ServiceKey) -> bool {
        self.inner.bindings.contains(key)
    }

    fn keys_for(&self, type_id: TypeId, include_async: bool) -> Vec<ServiceKey> {
        self.inner
            .bindings
            .iter()
            .filter(|(key, registration)| {
                key.type_id == type_id && (include_async || !registration.is_async())
            })
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("id", &self.inner.id)
            .field("services", &self.inner.bindings.count())
            .field("cached_singletons", &self.inner.singletons.cached_count().ok())
            .field(
                "cached_async_singletons",
                &self.inner.async_singletons.cached_count().ok(),
            )
            .finish()
    }
}

/// Service statistics for monitoring and debugging
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InjectorStatistics {
    pub total_services: usize,
    pub instances: usize,
    pub factories: usize,
    pub singletons: usize,
    pub async_factories: usize,
    pub async_singletons: usize,
    pub cached_singletons: usize,
    pub cached_async_singletons: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Repository: Send + Sync {
        fn find(&self, id: u32) -> Option<String>;
    }

    struct PostgresRepository;

    impl Repository for PostgresRepository {
        fn find(&self, _id: u32) -> Option<String> {
            Some("postgres_data".to_string())
        }
    }

    struct UserService {
        repository: Arc<dyn Repository>,
    }

    #[derive(Debug)]
    struct Ping;
    #[derive(Debug)]
    struct Pong;

    async fn build(builder: InjectorBuilder) -> Injector {
        builder.build().await.unwrap()
    }

    #[tokio::test]
    async fn test_basic_binding_and_resolution() {
        let mut builder = Injector::builder();
        builder.register_instance::<dyn Repository>(Arc::new(PostgresRepository) as Arc<dyn Repository>);
        builder.register_singleton::<UserService, _>(|ctx| {
            Ok(Arc::new(UserService {
                repository: ctx.get::<dyn Repository>()?,
            }))
        });
        let injector = build(builder).await;

        let service = injector.get::<UserService>().unwrap();
        assert_eq!(service.repository.find(1), Some("postgres_data".to_string()));
    }

    #[tokio::test]
    async fn test_named_services_are_independent() {
        let mut builder = Injector::builder();
        builder.register_instance_named::<String>("primary", "postgres".to_string());
        builder.register_instance_named::<String>("backup", "sqlite".to_string());
        let injector = build(builder).await;

        assert_eq!(*injector.get_named::<String>("primary").unwrap(), "postgres");
        assert_eq!(*injector.get_named::<String>("backup").unwrap(), "sqlite");
        assert!(injector.get::<String>().unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_singleton_behavior() {
        let mut builder = Injector::builder();
        builder.register_singleton::<PostgresRepository, _>(|_| Ok(Arc::new(PostgresRepository)));
        let injector = build(builder).await;

        let first = injector.get::<PostgresRepository>().unwrap();
        let second = injector.get::<PostgresRepository>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_factory_behavior() {
        let mut builder = Injector::builder();
        builder.register_factory::<PostgresRepository, _>(|_| Ok(Arc::new(PostgresRepository)));
        let injector = build(builder).await;

        let first = injector.get::<PostgresRepository>().unwrap();
        let second = injector.get::<PostgresRepository>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_self_dependency_is_a_cycle() {
        let mut builder = Injector::builder();
        builder.register_factory::<Ping, _>(|ctx| {
            ctx.get::<Ping>()?;
            Ok(Arc::new(Ping))
        });
        let injector = build(builder).await;

        let error = injector.get::<Ping>().unwrap_err();
        assert!(error.is_circular());
        assert_eq!(error.cycle().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_singleton_cycle_does_not_deadlock() {
        let mut builder = Injector::builder();
        builder.register_singleton::<Ping, _>(|ctx| {
            ctx.get::<Pong>()?;
            Ok(Arc::new(Ping))
        });
        builder.register_singleton::<Pong, _>(|ctx| {
            ctx.get::<Ping>()?;
            Ok(Arc::new(Pong))
        });
        let injector = build(builder).await;

        assert!(injector.get::<Pong>().unwrap_err().is_circular());
        assert_eq!(injector.get_statistics().unwrap().cached_singletons, 0);
    }

    #[tokio::test]
    async fn test_async_singleton_cycle_does_not_deadlock() {
        let mut builder = Injector::builder();
        builder.register_async_singleton::<Ping, _, _>(|ctx: ResolutionContext| async move {
            ctx.get_async::<Ping>().await?;
            Ok(Arc::new(Ping))
        });
        let injector = build(builder).await;

        assert!(injector.get_async::<Ping>().await.unwrap_err().is_circular());
    }

    #[tokio::test]
    async fn test_hook_runs_once_for_singletons() {
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let counter = hook_calls.clone();

        let mut builder = Injector::builder();
        builder
            .register_singleton::<PostgresRepository, _>(|_| Ok(Arc::new(PostgresRepository)))
            .on_create(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        let injector = build(builder).await;

        injector.get::<PostgresRepository>().unwrap();
        injector.get_async::<PostgresRepository>().await.unwrap();
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_statistics() {
        let mut builder = Injector::builder();
        builder.register_instance::<String>("config".to_string());
        builder.register_factory::<Ping, _>(|_| Ok(Arc::new(Ping)));
        builder.register_singleton::<Pong, _>(|_| Ok(Arc::new(Pong)));
        builder.register_async_singleton::<PostgresRepository, _, _>(|_| async {
            Ok(Arc::new(PostgresRepository))
        });
        let injector = build(builder).await;

        injector.get::<Pong>().unwrap();
        injector.get_async::<PostgresRepository>().await.unwrap();

        let stats = injector.get_statistics().unwrap();
        assert_eq!(stats.total_services, 4);
        assert_eq!(stats.instances, 1);
        assert_eq!(stats.factories, 1);
        assert_eq!(stats.singletons, 1);
        assert_eq!(stats.async_singletons, 1);
        assert_eq!(stats.cached_singletons, 1);
        assert_eq!(stats.cached_async_singletons, 1);
    }

    #[tokio::test]
    async fn test_clones_share_singletons() {
        let mut builder = Injector::builder();
        builder.register_singleton::<Pong, _>(|_| Ok(Arc::new(Pong)));
        let injector = build(builder).await;
        let clone = injector.clone();

        assert!(Arc::ptr_eq(
            &injector.get::<Pong>().unwrap(),
            &clone.get::<Pong>().unwrap()
        ));
        assert_eq!(injector.id(), clone.id());
    }
}
