//! Dependency-resolution container for elif.rs applications.
//!
//! Services are registered on an [`InjectorBuilder`] as instances, factories,
//! singletons or their async counterparts, then frozen into an [`Injector`]
//! by the async [`InjectorBuilder::build`], which also constructs eager
//! singletons in registration order.

pub mod config;
pub mod container;
pub mod errors;

pub use config::InjectorConfig;
pub use container::{
    AsyncBinding, EagerBinding, Injector, InjectorBuilder, InjectorStatistics, Registration,
    RegistrationKind, ResolutionContext, ResolutionStack, Resolver, ServiceKey, SyncBinding,
};
pub use errors::{BoxError, InjectorError, ResolutionTrace};

/// Common imports for registering and resolving services
pub mod prelude {
    pub use crate::config::InjectorConfig;
    pub use crate::container::{Injector, InjectorBuilder, ResolutionContext, Resolver, ServiceKey};
    pub use crate::errors::InjectorError;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
