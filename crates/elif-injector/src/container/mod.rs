pub mod builder;
pub mod cache;
pub mod context;
pub mod descriptor;
pub mod injector;
pub mod lifecycle;
pub mod registration;
pub mod resolver;

pub use builder::{AsyncBinding, EagerBinding, InjectorBuilder, SyncBinding};
pub use cache::{AsyncSingletonCache, SingletonCache};
pub use context::ResolutionContext;
pub use descriptor::ServiceKey;
pub use injector::{Injector, InjectorStatistics};
pub use lifecycle::{EagerSingletonQueue, EagerSingletonRequest};
pub use registration::{AnyArc, Registration, RegistrationKind, ServiceBindings};
pub use resolver::{ResolutionStack, Resolver};
