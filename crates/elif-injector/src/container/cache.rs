use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::container::descriptor::ServiceKey;
use crate::container::registration::AnyArc;
use crate::errors::InjectorError;

/// Lock-protected map from key to a per-key once-cell.
///
/// The cell is the claim ticket: whoever initializes it constructs the
/// service, concurrent callers for the same key wait on it, and callers for
/// other keys never contend beyond the short map lookup.
#[derive(Debug)]
struct ClaimMap<C> {
    cells: Arc<RwLock<HashMap<ServiceKey, Arc<C>>>>,
    resource: &'static str,
}

impl<C> Clone for ClaimMap<C> {
    fn clone(&self) -> Self {
        Self {
            cells: self.cells.clone(),
            resource: self.resource,
        }
    }
}

impl<C: Default> ClaimMap<C> {
    fn new(resource: &'static str) -> Self {
        Self {
            cells: Arc::new(RwLock::new(HashMap::new())),
            resource,
        }
    }

    fn existing(&self, key: &ServiceKey) -> Result<Option<Arc<C>>, InjectorError> {
        let cells = self
            .cells
            .read()
            .map_err(|_| InjectorError::lock(self.resource))?;
        Ok(cells.get(key).cloned())
    }

    fn claim(&self, key: &ServiceKey) -> Result<Arc<C>, InjectorError> {
        if let Some(cell) = self.existing(key)? {
            return Ok(cell);
        }

        let mut cells = self
            .cells
            .write()
            .map_err(|_| InjectorError::lock(self.resource))?;
        Ok(cells.entry(key.clone()).or_default().clone())
    }

    fn count_where(&self, filled: impl Fn(&C) -> bool) -> Result<usize, InjectorError> {
        let cells = self
            .cells
            .read()
            .map_err(|_| InjectorError::lock(self.resource))?;
        Ok(cells.values().filter(|cell| filled(cell)).count())
    }
}

/// Cache for synchronous singletons
#[derive(Debug, Clone)]
pub struct SingletonCache {
    claims: ClaimMap<once_cell::sync::OnceCell<AnyArc>>,
}

impl SingletonCache {
    pub fn new() -> Self {
        Self {
            claims: ClaimMap::new("singleton_cache"),
        }
    }

    /// Cached value for `key`, without waiting on an in-flight construction
    pub fn get(&self, key: &ServiceKey) -> Result<Option<AnyArc>, InjectorError> {
        Ok(self
            .claims
            .existing(key)?
            .and_then(|cell| cell.get().cloned()))
    }

    /// Return the cached value or construct it exactly once.
    ///
    /// The flag is `true` only for the call that ran `init`. A failed `init`
    /// leaves the key empty so a later call can retry.
    pub fn get_or_try_init<F>(
        &self,
        key: &ServiceKey,
        init: F,
    ) -> Result<(AnyArc, bool), InjectorError>
    where
        F: FnOnce() -> Result<AnyArc, InjectorError>,
    {
        let cell = self.claims.claim(key)?;
        let mut created = false;
        let value = cell
            .get_or_try_init(|| {
                created = true;
                init()
            })?
            .clone();
        Ok((value, created))
    }

    /// Number of singletons constructed so far
    pub fn cached_count(&self) -> Result<usize, InjectorError> {
        self.claims.count_where(|cell| cell.get().is_some())
    }
}

impl Default for SingletonCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache for asynchronous singletons
#[derive(Debug, Clone)]
pub struct AsyncSingletonCache {
    claims: ClaimMap<tokio::sync::OnceCell<AnyArc>>,
}

impl AsyncSingletonCache {
    pub fn new() -> Self {
        Self {
            claims: ClaimMap::new("async_singleton_cache"),
        }
    }

    pub fn get(&self, key: &ServiceKey) -> Result<Option<AnyArc>, InjectorError> {
        Ok(self
            .claims
            .existing(key)?
            .and_then(|cell| cell.get().cloned()))
    }

    /// Async counterpart of [`SingletonCache::get_or_try_init`]. Concurrent
    /// callers await the first construction instead of blocking a thread.
    pub async fn get_or_try_init<F, Fut>(
        &self,
        key: &ServiceKey,
        init: F,
    ) -> Result<(AnyArc, bool), InjectorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AnyArc, InjectorError>>,
    {
        let cell = self.claims.claim(key)?;
        let mut created = false;
        let value = cell
            .get_or_try_init(|| {
                created = true;
                init()
            })
            .await?
            .clone();
        Ok((value, created))
    }

    pub fn cached_count(&self) -> Result<usize, InjectorError> {
        self.claims.count_where(|cell| cell.get().is_some())
    }
}

impl Default for AsyncSingletonCache {
    fn default() -> Self {
        Self::new()
    }
}
