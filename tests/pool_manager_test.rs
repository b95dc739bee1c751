use async_trait::async_trait;
use std::time::Duration;
use upool::pool_manager::{PoolManager, pool_mgr};
use upool::udbc_memory::MemoryProvider;
use upool::{ConnectionPool, PoolConfig, PoolError, Provider, ProviderError, WorkerId};

/// Provider of unit handles, only used to exercise typed lookups.
struct UnitProvider;

#[async_trait]
impl Provider for UnitProvider {
    type Handle = ();
    type Options = ();

    fn r#type(&self) -> &str {
        "unit"
    }

    async fn new_connection(&self, _options: &()) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn close_connection(&self, _handle: &()) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_register_uses_loaded_definitions() {
    let manager = pool_mgr();
    manager.assets("tests/resources/pools").expect("Failed to load pools");

    let pool = manager
        .register("it_main", MemoryProvider::new(), ())
        .expect("it_main matches the memory provider");
    assert_eq!(pool.config().max_clients, Some(2));
    assert_eq!(pool.config().max_wait, Some(Duration::from_millis(100)));

    let found = manager
        .pool::<MemoryProvider>("it_main")
        .expect("Should find it_main");
    let worker = WorkerId::next();
    found.acquire(worker).await.unwrap();
    assert_eq!(pool.size(), 1);

    let err = manager
        .register("it_strict", MemoryProvider::new(), ())
        .err()
        .expect("it_strict expects a mysql provider");
    assert!(matches!(err, PoolError::InvalidProvider { .. }));
    assert!(manager.pool::<MemoryProvider>("it_strict").is_none());
}

#[test]
fn test_missing_assets_directory_is_ignored() {
    let manager = PoolManager::new();
    assert!(manager.assets("tests/resources/does-not-exist").is_ok());
}

#[tokio::test]
async fn test_typed_lookup() {
    let manager = PoolManager::new();
    let pool = ConnectionPool::new(UnitProvider, PoolConfig::default(), ()).unwrap();
    manager.register_pool("unit", pool);
    manager.register("undeclared", MemoryProvider::new(), ()).unwrap();

    assert!(manager.pool::<UnitProvider>("unit").is_some());
    assert!(manager.pool::<MemoryProvider>("unit").is_none());
    assert!(manager.pool::<UnitProvider>("nope").is_none());

    // Pools without a definition get the defaults
    let undeclared = manager.pool::<MemoryProvider>("undeclared").unwrap();
    assert_eq!(undeclared.config(), &PoolConfig::default());

    let mut names = manager.names();
    names.sort();
    assert_eq!(names, vec!["undeclared".to_string(), "unit".to_string()]);

    assert!(manager.remove("unit"));
    assert!(!manager.remove("unit"));
}
