use std::time::Duration;
use thiserror::Error;

use crate::container::descriptor::ServiceKey;
use crate::container::resolver::ResolutionStack;

/// Boxed error type accepted from constructors and hooks
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where in the dependency graph a lookup failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTrace {
    /// Services under construction when the lookup failed, outermost first
    pub path: Vec<ServiceKey>,
    /// The service whose constructor asked for the missing one
    pub requested_by: Option<ServiceKey>,
}

impl ResolutionTrace {
    pub(crate) fn from_stack(stack: &ResolutionStack) -> Self {
        Self {
            path: stack.services().to_vec(),
            requested_by: stack.requester().cloned(),
        }
    }
}

/// Errors raised while registering or resolving services
#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("Service not found: {key}{}", render_trace(.context))]
    ServiceNotFound {
        key: ServiceKey,
        context: Option<ResolutionTrace>,
    },

    #[error("Circular dependency detected: {}", render_chain(.chain))]
    CircularDependency { chain: Vec<ServiceKey> },

    #[error("Service {key} is registered for async construction; resolve it with get_async")]
    InvalidSyncAccess { key: ServiceKey },

    #[error("Service {key} was registered more than once while strict registration is enabled")]
    DuplicateRegistration { key: ServiceKey },

    #[error("Eager singleton {key} did not finish within {timeout:?}")]
    EagerInitTimeout { key: ServiceKey, timeout: Duration },

    #[error("Resolved value for {key} is not a {expected}")]
    TypeMismatch {
        key: ServiceKey,
        expected: &'static str,
    },

    #[error("Construction of '{service}' failed: {source}")]
    ConstructionFailed { service: String, source: BoxError },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl InjectorError {
    /// Create a not-found error without resolution context.
    ///
    /// The nearest enclosing resolution fills in the path when the error
    /// propagates out of a constructor.
    pub fn service_not_found(key: ServiceKey) -> Self {
        Self::ServiceNotFound { key, context: None }
    }

    /// Wrap a foreign error raised while building a service
    pub fn construction(
        service: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::ConstructionFailed {
            service: service.into(),
            source: source.into(),
        }
    }

    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    pub(crate) fn not_found_in(key: &ServiceKey, stack: &ResolutionStack) -> Self {
        Self::ServiceNotFound {
            key: key.clone(),
            context: Some(ResolutionTrace::from_stack(stack)),
        }
    }

    /// Attach resolution context to a not-found error that has none yet.
    /// Anything else, including an already-enriched not-found, passes through.
    pub(crate) fn with_resolution_context(self, stack: &ResolutionStack) -> Self {
        match self {
            Self::ServiceNotFound { key, context: None } => Self::ServiceNotFound {
                key,
                context: Some(ResolutionTrace::from_stack(stack)),
            },
            other => other,
        }
    }

    /// Check if the error is a missing service
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }

    /// Check if the error is a dependency cycle
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    /// Check if the error is a sync lookup of an async-only binding
    pub fn is_invalid_sync_access(&self) -> bool {
        matches!(self, Self::InvalidSyncAccess { .. })
    }

    /// The missing key, for not-found errors
    pub fn missing_key(&self) -> Option<&ServiceKey> {
        match self {
            Self::ServiceNotFound { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Resolution context carried by a not-found error
    pub fn resolution_trace(&self) -> Option<&ResolutionTrace> {
        match self {
            Self::ServiceNotFound { context, .. } => context.as_ref(),
            _ => None,
        }
    }

    /// The cycle itself, repeated service at both ends. The full chain in
    /// the variant also keeps whatever led into the cycle.
    pub fn cycle(&self) -> Option<&[ServiceKey]> {
        match self {
            Self::CircularDependency { chain } => {
                let repeated = chain.last()?;
                let start = chain.iter().position(|key| key == repeated)?;
                Some(&chain[start..])
            }
            _ => None,
        }
    }
}

fn render_chain(chain: &[ServiceKey]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn render_trace(context: &Option<ResolutionTrace>) -> String {
    match context {
        Some(trace) if !trace.path.is_empty() => {
            let requester = trace
                .requested_by
                .as_ref()
                .map(|key| format!(", requested by {}", key))
                .unwrap_or_default();
            format!(" (resolution path: {}{})", render_chain(&trace.path), requester)
        }
        _ => String::new(),
    }
}
