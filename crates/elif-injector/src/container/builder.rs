use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::InjectorConfig;
use crate::container::cache::{AsyncSingletonCache, SingletonCache};
use crate::container::context::ResolutionContext;
use crate::container::descriptor::ServiceKey;
use crate::container::injector::Injector;
use crate::container::lifecycle::EagerSingletonQueue;
use crate::container::registration::{
    async_constructor, async_hook, erase, sync_constructor, sync_hook, Registration,
    ServiceBindings,
};
use crate::errors::InjectorError;

/// Mutable accumulator of bindings, consumed by [`InjectorBuilder::build`].
///
/// Registering a key that is already bound replaces the earlier binding.
/// Enable [`InjectorConfig::strict_registration`] to turn that into a build
/// error instead.
#[derive(Debug, Default)]
pub struct InjectorBuilder {
    bindings: ServiceBindings,
    eager: EagerSingletonQueue,
    config: InjectorConfig,
    overwritten: Vec<ServiceKey>,
}

impl InjectorBuilder {
    /// Create a new injector builder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: InjectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    /// Number of bindings registered so far, excluding eager singletons
    pub fn binding_count(&self) -> usize {
        self.bindings.count()
    }

    pub fn eager_count(&self) -> usize {
        self.eager.len()
    }

    /// Bind an already-built value
    pub fn register_instance<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        value: impl Into<Arc<T>>,
    ) -> &mut Self {
        self.insert(ServiceKey::of::<T>(), Registration::Instance(erase(value.into())));
        self
    }

    pub fn register_instance_named<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Arc<T>>,
    ) -> &mut Self {
        self.insert(
            ServiceKey::named::<T>(name),
            Registration::Instance(erase(value.into())),
        );
        self
    }

    /// Bind a constructor that runs on every resolution
    pub fn register_factory<T, F>(&mut self, construct: F) -> SyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
    {
        self.bind_sync(ServiceKey::of::<T>(), construct, false)
    }

    pub fn register_factory_named<T, F>(
        &mut self,
        name: impl Into<String>,
        construct: F,
    ) -> SyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
    {
        self.bind_sync(ServiceKey::named::<T>(name), construct, false)
    }

    /// Bind a constructor that runs at most once per injector
    pub fn register_singleton<T, F>(&mut self, construct: F) -> SyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
    {
        self.bind_sync(ServiceKey::of::<T>(), construct, true)
    }

    pub fn register_singleton_named<T, F>(
        &mut self,
        name: impl Into<String>,
        construct: F,
    ) -> SyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
    {
        self.bind_sync(ServiceKey::named::<T>(name), construct, true)
    }

    /// Bind an async constructor that runs on every `get_async`
    pub fn register_async_factory<T, F, Fut>(&mut self, construct: F) -> AsyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, InjectorError>> + Send + 'static,
    {
        self.bind_async(ServiceKey::of::<T>(), construct, false)
    }

    pub fn register_async_factory_named<T, F, Fut>(
        &mut self,
        name: impl Into<String>,
        construct: F,
    ) -> AsyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, InjectorError>> + Send + 'static,
    {
        self.bind_async(ServiceKey::named::<T>(name), construct, false)
    }

    /// Bind an async constructor that runs at most once per injector
    pub fn register_async_singleton<T, F, Fut>(&mut self, construct: F) -> AsyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, InjectorError>> + Send + 'static,
    {
        self.bind_async(ServiceKey::of::<T>(), construct, true)
    }

    pub fn register_async_singleton_named<T, F, Fut>(
        &mut self,
        name: impl Into<String>,
        construct: F,
    ) -> AsyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, InjectorError>> + Send + 'static,
    {
        self.bind_async(ServiceKey::named::<T>(name), construct, true)
    }

    /// Queue a singleton that is constructed during `build()`, in
    /// registration order, and afterwards resolves like an instance
    pub fn register_eager_singleton<T, F, Fut>(&mut self, construct: F) -> EagerBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, InjectorError>> + Send + 'static,
    {
        self.bind_eager(ServiceKey::of::<T>(), construct)
    }

    pub fn register_eager_singleton_named<T, F, Fut>(
        &mut self,
        name: impl Into<String>,
        construct: F,
    ) -> EagerBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, InjectorError>> + Send + 'static,
    {
        self.bind_eager(ServiceKey::named::<T>(name), construct)
    }

    /// Run the eager singletons and freeze the bindings.
    ///
    /// Fails on the first eager constructor or hook error; no injector is
    /// produced in that case.
    pub async fn build(self) -> Result<Injector, InjectorError> {
        if self.config.strict_registration {
            if let Some(key) = self.overwritten.into_iter().next() {
                return Err(InjectorError::DuplicateRegistration { key });
            }
        }

        let id = Uuid::new_v4();
        let singletons = SingletonCache::new();
        let async_singletons = AsyncSingletonCache::new();
        let mut bindings = self.bindings;
        let eager_count = self.eager.len();

        tracing::info!(
            injector = %id,
            "Building injector with {} bindings and {} eager singletons",
            bindings.count(),
            eager_count
        );

        self.eager
            .materialize(
                id,
                &mut bindings,
                &singletons,
                &async_singletons,
                self.config.eager_init_timeout(),
            )
            .await?;

        if eager_count > 0 {
            tracing::info!(injector = %id, "Materialized {} eager singletons", eager_count);
        }

        Ok(Injector::from_parts(id, bindings, singletons, async_singletons))
    }

    fn insert(&mut self, key: ServiceKey, registration: Registration) {
        let replaced = self.bindings.insert(key.clone(), registration).is_some();
        if replaced || self.eager.contains(&key) {
            tracing::debug!(service = %key, "Replacing existing registration");
            self.overwritten.push(key);
        }
    }

    fn bind_sync<T, F>(&mut self, key: ServiceKey, construct: F, singleton: bool) -> SyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolutionContext) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
    {
        let construct = sync_constructor::<T, F>(construct);
        let registration = if singleton {
            Registration::Singleton {
                construct,
                on_create: None,
            }
        } else {
            Registration::Factory {
                construct,
                on_create: None,
            }
        };
        self.insert(key.clone(), registration);

        SyncBinding {
            builder: self,
            key,
            _phantom: PhantomData,
        }
    }

    fn bind_async<T, F, Fut>(
        &mut self,
        key: ServiceKey,
        construct: F,
        singleton: bool,
    ) -> AsyncBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, InjectorError>> + Send + 'static,
    {
        let construct = async_constructor::<T, F, Fut>(construct);
        let registration = if singleton {
            Registration::AsyncSingleton {
                construct,
                on_create: None,
            }
        } else {
            Registration::AsyncFactory {
                construct,
                on_create: None,
            }
        };
        self.insert(key.clone(), registration);

        AsyncBinding {
            builder: self,
            key,
            _phantom: PhantomData,
        }
    }

    fn bind_eager<T, F, Fut>(&mut self, key: ServiceKey, construct: F) -> EagerBinding<'_, T>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, InjectorError>> + Send + 'static,
    {
        if self.bindings.contains(&key) || self.eager.contains(&key) {
            tracing::debug!(service = %key, "Eager singleton replaces existing registration");
            self.overwritten.push(key.clone());
        }
        let index = self
            .eager
            .push(key.clone(), async_constructor::<T, F, Fut>(construct));

        EagerBinding {
            builder: self,
            key,
            index,
            _phantom: PhantomData,
        }
    }
}

/// Handle to a just-registered factory or singleton
pub struct SyncBinding<'a, T: ?Sized> {
    builder: &'a mut InjectorBuilder,
    key: ServiceKey,
    _phantom: PhantomData<*const T>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> SyncBinding<'a, T> {
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Run `hook` after each construction of this service.
    /// Singletons run it once, on the resolution that built the value.
    pub fn on_create<H>(self, hook: H) -> &'a mut InjectorBuilder
    where
        H: Fn(&Arc<T>, &ResolutionContext) -> Result<(), InjectorError> + Send + Sync + 'static,
    {
        let hook = sync_hook::<T, H>(self.key.clone(), hook);
        if let Some(registration) = self.builder.bindings.get_mut(&self.key) {
            registration.set_sync_hook(hook);
        }
        self.builder
    }

    /// Continue registering without a hook
    pub fn done(self) -> &'a mut InjectorBuilder {
        self.builder
    }
}

/// Handle to a just-registered async factory or async singleton
pub struct AsyncBinding<'a, T: ?Sized> {
    builder: &'a mut InjectorBuilder,
    key: ServiceKey,
    _phantom: PhantomData<*const T>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> AsyncBinding<'a, T> {
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Await `hook` after each construction of this service
    pub fn on_create<H, Fut>(self, hook: H) -> &'a mut InjectorBuilder
    where
        H: Fn(Arc<T>, ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), InjectorError>> + Send + 'static,
    {
        let hook = async_hook::<T, H, Fut>(self.key.clone(), hook);
        if let Some(registration) = self.builder.bindings.get_mut(&self.key) {
            registration.set_async_hook(hook);
        }
        self.builder
    }

    pub fn done(self) -> &'a mut InjectorBuilder {
        self.builder
    }
}

/// Handle to a just-queued eager singleton
pub struct EagerBinding<'a, T: ?Sized> {
    builder: &'a mut InjectorBuilder,
    key: ServiceKey,
    index: usize,
    _phantom: PhantomData<*const T>,
}

impl<'a, T: ?Sized + Send + Sync + 'static> EagerBinding<'a, T> {
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// Await `hook` once, during `build()`, right after construction
    pub fn on_create<H, Fut>(self, hook: H) -> &'a mut InjectorBuilder
    where
        H: Fn(Arc<T>, ResolutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), InjectorError>> + Send + 'static,
    {
        let hook = async_hook::<T, H, Fut>(self.key.clone(), hook);
        self.builder.eager.set_hook(self.index, hook);
        self.builder
    }

    pub fn done(self) -> &'a mut InjectorBuilder {
        self.builder
    }
}
