use std::time::Duration;

use uuid::Uuid;

use crate::container::cache::{AsyncSingletonCache, SingletonCache};
use crate::container::context::ResolutionContext;
use crate::container::descriptor::ServiceKey;
use crate::container::injector::Injector;
use crate::container::registration::{
    AnyArc, AsyncConstructor, AsyncHook, Registration, ServiceBindings,
};
use crate::container::resolver::ResolutionStack;
use crate::errors::InjectorError;

/// Singleton whose async construction happens during `build()`
pub struct EagerSingletonRequest {
    pub key: ServiceKey,
    pub(crate) construct: AsyncConstructor,
    pub(crate) on_create: Option<AsyncHook>,
}

impl std::fmt::Debug for EagerSingletonRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EagerSingletonRequest")
            .field("key", &self.key)
            .field("on_create", &self.on_create.is_some())
            .finish()
    }
}

/// Eager singleton requests in registration order
#[derive(Debug, Default)]
pub struct EagerSingletonQueue {
    requests: Vec<EagerSingletonRequest>,
}

impl EagerSingletonQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request, returning its position
    pub(crate) fn push(&mut self, key: ServiceKey, construct: AsyncConstructor) -> usize {
        self.requests.push(EagerSingletonRequest {
            key,
            construct,
            on_create: None,
        });
        self.requests.len() - 1
    }

    pub(crate) fn set_hook(&mut self, index: usize, hook: AsyncHook) {
        if let Some(request) = self.requests.get_mut(index) {
            request.on_create = Some(hook);
        }
    }

    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.requests.iter().any(|request| &request.key == key)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
        self.requests.iter().map(|request| &request.key)
    }

    /// Construct every queued singleton, strictly one after another, and
    /// replace its binding with the finished instance.
    ///
    /// Each constructor sees an injector over the bindings accumulated so far,
    /// including eager singletons materialized earlier in the queue. All of
    /// those injectors share `singletons` and `async_singletons`, so anything
    /// cached along the way survives into the final injector.
    pub(crate) async fn materialize(
        self,
        injector_id: Uuid,
        bindings: &mut ServiceBindings,
        singletons: &SingletonCache,
        async_singletons: &AsyncSingletonCache,
        timeout: Option<Duration>,
    ) -> Result<(), InjectorError> {
        let total = self.requests.len();

        for (position, request) in self.requests.into_iter().enumerate() {
            let snapshot = Injector::from_parts(
                injector_id,
                bindings.clone(),
                singletons.clone(),
                async_singletons.clone(),
            );
            let stack = ResolutionStack::new().descend(request.key.clone());
            let context = ResolutionContext::new(snapshot, stack.clone());

            tracing::debug!(
                injector = %injector_id,
                service = %request.key,
                "Constructing eager singleton {}/{}",
                position + 1,
                total
            );

            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, Self::run(&request, context))
                    .await
                    .unwrap_or_else(|_| {
                        Err(InjectorError::EagerInitTimeout {
                            key: request.key.clone(),
                            timeout: limit,
                        })
                    }),
                None => Self::run(&request, context).await,
            };

            let value = outcome.map_err(|error| {
                tracing::warn!(
                    injector = %injector_id,
                    service = %request.key,
                    "Eager singleton failed: {}",
                    error
                );
                error.with_resolution_context(&stack)
            })?;

            bindings.insert(request.key, Registration::Instance(value));
        }

        Ok(())
    }

    async fn run(
        request: &EagerSingletonRequest,
        context: ResolutionContext,
    ) -> Result<AnyArc, InjectorError> {
        let value = (request.construct)(context.clone()).await?;
        if let Some(hook) = &request.on_create {
            hook(value.clone(), context).await?;
        }
        Ok(value)
    }
}
