use std::any::TypeId;

use async_trait::async_trait;

use crate::container::descriptor::ServiceKey;
use crate::container::injector::Injector;
use crate::container::registration::AnyArc;
use crate::container::resolver::{ResolutionStack, Resolver};
use crate::errors::InjectorError;

/// View of an [`Injector`] bound to the resolution stack of one call path.
///
/// Constructors and hooks receive one of these and resolve their own
/// dependencies through it, which keeps them inside cycle detection.
#[derive(Clone)]
pub struct ResolutionContext {
    injector: Injector,
    stack: ResolutionStack,
}

impl ResolutionContext {
    pub(crate) fn new(injector: Injector, stack: ResolutionStack) -> Self {
        Self { injector, stack }
    }

    /// Services under construction on this path, outermost first
    pub fn stack(&self) -> &ResolutionStack {
        &self.stack
    }

    /// The service being constructed, if any
    pub fn current(&self) -> Option<&ServiceKey> {
        self.stack.requester()
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("injector", &self.injector.id())
            .field("stack", &self.stack.path_string())
            .finish()
    }
}

#[async_trait]
impl Resolver for ResolutionContext {
    fn resolve_key(&self, key: &ServiceKey) -> Result<AnyArc, InjectorError> {
        self.injector.resolve_with_stack(key, &self.stack)
    }

    async fn resolve_key_async(&self, key: &ServiceKey) -> Result<AnyArc, InjectorError> {
        self.injector.resolve_async_with_stack(key, &self.stack).await
    }

    fn contains_key(&self, key: &ServiceKey) -> bool {
        self.injector.contains_key(key)
    }

    fn contains_key_async(&self, key: &ServiceKey) -> bool {
        self.injector.contains_key_async(key)
    }

    fn keys_for(&self, type_id: TypeId, include_async: bool) -> Vec<ServiceKey> {
        self.injector.keys_for(type_id, include_async)
    }
}
