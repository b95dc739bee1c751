use std::time::Duration;

use thiserror::Error;

/// Errors raised by a connection provider while creating or disposing of a handle.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Connect error: {0}")]
    Connect(String),
    #[error("Close error: {0}")]
    Close(String),
    #[error("Driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Represents errors that can occur while building or using a connection pool.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid provider: expected '{expected}', got '{found}'")]
    InvalidProvider { expected: String, found: String },
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
    #[error("Timed out after {0:?} waiting for a free connection")]
    Timeout(Duration),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for ProviderError {
    fn from(e: mysql_async::Error) -> Self {
        ProviderError::Driver(Box::new(e))
    }
}
