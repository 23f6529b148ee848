use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, TryFutureExt};

use crate::container::context::ResolutionContext;
use crate::container::descriptor::ServiceKey;
use crate::errors::InjectorError;

/// Type-erased service value. The concrete payload is always an `Arc<T>`
/// for the key's `T`, so trait objects survive the round trip.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Erased synchronous constructor
pub type SyncConstructor =
    Arc<dyn Fn(&ResolutionContext) -> Result<AnyArc, InjectorError> + Send + Sync>;

/// Erased asynchronous constructor
pub type AsyncConstructor = Arc<
    dyn Fn(ResolutionContext) -> BoxFuture<'static, Result<AnyArc, InjectorError>> + Send + Sync,
>;

/// Erased synchronous on-create hook
pub type SyncHook =
    Arc<dyn Fn(&AnyArc, &ResolutionContext) -> Result<(), InjectorError> + Send + Sync>;

/// Erased asynchronous on-create hook
pub type AsyncHook = Arc<
    dyn Fn(AnyArc, ResolutionContext) -> BoxFuture<'static, Result<(), InjectorError>>
        + Send
        + Sync,
>;

/// Construction strategy bound to a single service key
#[derive(Clone)]
pub enum Registration {
    /// Already-built value, returned as is
    Instance(AnyArc),
    /// Built fresh on every resolution
    Factory {
        construct: SyncConstructor,
        on_create: Option<SyncHook>,
    },
    /// Built once per injector, then cached
    Singleton {
        construct: SyncConstructor,
        on_create: Option<SyncHook>,
    },
    /// Built fresh on every async resolution
    AsyncFactory {
        construct: AsyncConstructor,
        on_create: Option<AsyncHook>,
    },
    /// Built once per injector by the async path, then cached
    AsyncSingleton {
        construct: AsyncConstructor,
        on_create: Option<AsyncHook>,
    },
}

impl Registration {
    /// Whether only `get_async` may resolve this registration
    pub fn is_async(&self) -> bool {
        matches!(
            self,
            Registration::AsyncFactory { .. } | Registration::AsyncSingleton { .. }
        )
    }

    pub fn kind(&self) -> RegistrationKind {
        match self {
            Registration::Instance(_) => RegistrationKind::Instance,
            Registration::Factory { .. } => RegistrationKind::Factory,
            Registration::Singleton { .. } => RegistrationKind::Singleton,
            Registration::AsyncFactory { .. } => RegistrationKind::AsyncFactory,
            Registration::AsyncSingleton { .. } => RegistrationKind::AsyncSingleton,
        }
    }

    pub(crate) fn set_sync_hook(&mut self, hook: SyncHook) {
        if let Registration::Factory { on_create, .. } | Registration::Singleton { on_create, .. } =
            self
        {
            *on_create = Some(hook);
        }
    }

    pub(crate) fn set_async_hook(&mut self, hook: AsyncHook) {
        if let Registration::AsyncFactory { on_create, .. }
        | Registration::AsyncSingleton { on_create, .. } = self
        {
            *on_create = Some(hook);
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Registration::Instance(_) => write!(f, "Instance(<value>)"),
            Registration::Factory { on_create, .. }
            | Registration::Singleton { on_create, .. } => write!(
                f,
                "{}(<constructor>, on_create: {})",
                self.kind(),
                on_create.is_some()
            ),
            Registration::AsyncFactory { on_create, .. }
            | Registration::AsyncSingleton { on_create, .. } => write!(
                f,
                "{}(<constructor>, on_create: {})",
                self.kind(),
                on_create.is_some()
            ),
        }
    }
}

/// Registration variant without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationKind {
    Instance,
    Factory,
    Singleton,
    AsyncFactory,
    AsyncSingleton,
}

impl RegistrationKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationKind::Instance => "instance",
            RegistrationKind::Factory => "factory",
            RegistrationKind::Singleton => "singleton",
            RegistrationKind::AsyncFactory => "async_factory",
            RegistrationKind::AsyncSingleton => "async_singleton",
        }
    }
}

impl std::fmt::Display for RegistrationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Binding map that remembers registration order.
///
/// Replacing a key keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct ServiceBindings {
    registrations: HashMap<ServiceKey, Registration>,
    order: Vec<ServiceKey>,
}

impl ServiceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the previous registration for the key
    pub fn insert(&mut self, key: ServiceKey, registration: Registration) -> Option<Registration> {
        let previous = self.registrations.insert(key.clone(), registration);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    pub fn get(&self, key: &ServiceKey) -> Option<&Registration> {
        self.registrations.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &ServiceKey) -> Option<&mut Registration> {
        self.registrations.get_mut(key)
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.registrations.contains_key(key)
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in registration order
    pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
        self.order.iter()
    }

    /// Registrations in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&ServiceKey, &Registration)> {
        self.order
            .iter()
            .filter_map(move |key| self.registrations.get(key).map(|reg| (key, reg)))
    }
}

pub(crate) fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyArc {
    Arc::new(value)
}

pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(
    key: &ServiceKey,
    value: &AnyArc,
) -> Result<Arc<T>, InjectorError> {
    value
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| InjectorError::TypeMismatch {
            key: key.clone(),
            expected: std::any::type_name::<T>(),
        })
}

pub(crate) fn sync_constructor<T, F>(construct: F) -> SyncConstructor
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(&ResolutionContext) -> Result<Arc<T>, InjectorError> + Send + Sync + 'static,
{
    Arc::new(move |context: &ResolutionContext| construct(context).map(erase::<T>))
}

pub(crate) fn async_constructor<T, F, Fut>(construct: F) -> AsyncConstructor
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(ResolutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<T>, InjectorError>> + Send + 'static,
{
    Arc::new(move |context: ResolutionContext| {
        construct(context).map_ok(erase::<T>).boxed()
    })
}

pub(crate) fn sync_hook<T, H>(key: ServiceKey, hook: H) -> SyncHook
where
    T: ?Sized + Send + Sync + 'static,
    H: Fn(&Arc<T>, &ResolutionContext) -> Result<(), InjectorError> + Send + Sync + 'static,
{
    Arc::new(move |value: &AnyArc, context: &ResolutionContext| {
        let typed = downcast::<T>(&key, value)?;
        hook(&typed, context)
    })
}

pub(crate) fn async_hook<T, H, Fut>(key: ServiceKey, hook: H) -> AsyncHook
where
    T: ?Sized + Send + Sync + 'static,
    H: Fn(Arc<T>, ResolutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), InjectorError>> + Send + 'static,
{
    let hook = Arc::new(hook);
    Arc::new(move |value: AnyArc, context: ResolutionContext| {
        let typed = downcast::<T>(&key, &value);
        let hook = hook.clone();
        async move { hook(typed?, context).await }.boxed()
    })
}
