use std::any::Any;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use tracing::debug;

use crate::config_loader::{find_pool_config, load_from_path};
use crate::error::PoolError;
use crate::pool::ConnectionPool;
use crate::udbc::provider::Provider;

// Process-wide registry of named pools.
pub static POOLS: LazyLock<PoolManager> = LazyLock::new(PoolManager::new);

/// Directory of named connection pools.
///
/// Pools of different provider types live side by side; lookups are typed
/// by the provider the caller expects.
pub struct PoolManager {
    pools: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

/// Returns the global `PoolManager` instance.
pub fn pool_mgr() -> &'static PoolManager {
    &POOLS
}

impl Default for PoolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolManager {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Loads pool definitions from every XML file below `path`.
    pub fn assets(&self, path: impl AsRef<Path>) -> Result<(), PoolError> {
        load_from_path(path.as_ref()).map_err(|e| {
            PoolError::InvalidConfig(format!("Failed to load pool definitions: {:#}", e))
        })
    }

    /// Builds and registers a pool named `name`.
    ///
    /// Settings come from the loaded definition of the same name, or the
    /// defaults when there is none.
    pub fn register<P: Provider>(
        &self,
        name: &str,
        provider: P,
        options: P::Options,
    ) -> Result<Arc<ConnectionPool<P>>, PoolError> {
        let config = find_pool_config(name).unwrap_or_default();
        let pool = ConnectionPool::new(provider, config, options)?;
        Ok(self.register_pool(name, pool))
    }

    /// Registers an already built pool, replacing any pool of the same name.
    pub fn register_pool<P: Provider>(&self, name: &str, pool: ConnectionPool<P>) -> Arc<ConnectionPool<P>> {
        let pool = Arc::new(pool);
        if self.pools.insert(name.to_string(), pool.clone()).is_some() {
            debug!("pool '{}' replaced", name);
        } else {
            debug!("pool '{}' registered", name);
        }
        pool
    }

    /// Looks up pool `name`; `None` if missing or backed by another provider type.
    pub fn pool<P: Provider>(&self, name: &str) -> Option<Arc<ConnectionPool<P>>> {
        let pool = self.pools.get(name)?.value().clone();
        pool.downcast::<ConnectionPool<P>>().ok()
    }

    pub fn remove(&self, name: &str) -> bool {
        self.pools.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.pools.iter().map(|e| e.key().clone()).collect()
    }
}
