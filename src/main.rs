use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use upool::pool_manager::{POOLS, pool_mgr};
use upool::udbc::DEFAULT_POOL_NAME;
use upool::udbc_memory::MemoryProvider;
use upool::{ConnectionPool, PoolConfig, WorkerId};

const WORKERS: usize = 8;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let manager = pool_mgr();
    if let Some(dir) = std::env::args().nth(1) {
        manager.assets(&dir)?;
    }
    manager.register(DEFAULT_POOL_NAME, MemoryProvider::new(), ())?;

    let mut tasks = Vec::with_capacity(WORKERS);
    for _ in 0..WORKERS {
        tasks.push(tokio::task::spawn(async move {
            let pool: std::sync::Arc<ConnectionPool<MemoryProvider>> = POOLS
                .pool(DEFAULT_POOL_NAME)
                .ok_or_else(|| anyhow::anyhow!("pool '{}' not registered", DEFAULT_POOL_NAME))?;
            let worker = WorkerId::next();
            let client = pool.acquire(worker).await?;
            if client.ensure_open() {
                info!(worker = %worker, id = client.id(), "client reconnected");
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            pool.release(worker).await?;
            anyhow::Ok(())
        }));
    }
    for task in tasks {
        task.await??;
    }

    let bounded = ConnectionPool::new(
        MemoryProvider::new(),
        PoolConfig::new()
            .max_clients(Some(1))
            .max_wait(Some(Duration::from_millis(200))),
        (),
    )?;
    let holder = WorkerId::next();
    bounded.acquire(holder).await?;
    match bounded.acquire(WorkerId::next()).await {
        Ok(_) => info!("unexpectedly acquired a second client"),
        Err(e) => info!("second worker gave up: {}", e),
    }
    bounded.close().await?;

    if let Some(pool) = POOLS.pool::<MemoryProvider>(DEFAULT_POOL_NAME) {
        info!(
            size = pool.size(),
            created = pool.provider().created(),
            closed = pool.provider().closed().len(),
            "default pool state"
        );
        pool.close().await?;
    }
    Ok(())
}
