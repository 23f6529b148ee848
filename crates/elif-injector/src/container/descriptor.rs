use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Service identifier combining type and optional name
///
/// Two keys are equal when both the type and the name are equal; a named
/// binding never stands in for the unnamed one.
#[derive(Debug, Clone)]
pub struct ServiceKey {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub name: Option<String>,
}

impl ServiceKey {
    /// Create a new service key for a type
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: None,
        }
    }

    /// Create a named service key for a type
    pub fn named<T: 'static + ?Sized>(name: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: Some(name.into()),
        }
    }

    /// Key for `T` with an optional name
    pub fn with_name<T: 'static + ?Sized>(name: Option<&str>) -> Self {
        match name {
            Some(name) => Self::named::<T>(name),
            None => Self::of::<T>(),
        }
    }

    /// Check if this key matches a type and name without allocating
    pub fn matches<T: 'static + ?Sized>(&self, name: Option<&str>) -> bool {
        self.type_id == TypeId::of::<T>() && self.name.as_deref() == name
    }

    /// Check if this key is bound to type `T`, under any name
    pub fn is_type<T: 'static + ?Sized>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.type_name,
            self.name.as_deref().unwrap_or("default")
        )
    }
}
