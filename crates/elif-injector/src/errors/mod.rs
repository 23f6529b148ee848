pub mod core;

pub use self::core::{BoxError, InjectorError, ResolutionTrace};
