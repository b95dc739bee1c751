pub mod config_loader;
pub mod error;
pub mod models;
pub mod pool;
pub mod pool_manager;
pub mod udbc;
pub mod udbc_memory;
#[cfg(feature = "mysql")]
pub mod udbc_mysql;

pub use error::{PoolError, ProviderError};
pub use models::pool_config::PoolConfig;
pub use models::worker::WorkerId;
pub use pool::ConnectionPool;
pub use pool::entry::EntryInfo;
pub use udbc::provider::Provider;
