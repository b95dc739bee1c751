use std::time::Duration;

use crate::error::PoolError;

pub const DEFAULT_MAX_CLIENTS: usize = 10;

/// Sizing and waiting policy of a connection pool.
///
/// Immutable once the pool is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Provider type the pool expects; `None` accepts any provider.
    pub provider_type: Option<String>,
    /// Maximum number of pool entries; `None` grows without bound.
    pub max_clients: Option<usize>,
    /// How long `acquire` waits for a free entry at capacity.
    /// `None` evicts the oldest entry instead of waiting.
    pub max_wait: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            provider_type: None,
            max_clients: Some(DEFAULT_MAX_CLIENTS),
            max_wait: None,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider_type(mut self, provider_type: impl Into<String>) -> Self {
        self.provider_type = Some(provider_type.into());
        self
    }

    pub fn max_clients(mut self, max_clients: Option<usize>) -> Self {
        self.max_clients = max_clients;
        self
    }

    pub fn max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Rejects settings no pool can honour.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_clients == Some(0) {
            return Err(PoolError::InvalidConfig(
                "max_clients must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.max_clients, Some(10));
        assert_eq!(config.max_wait, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = PoolConfig::new().max_clients(Some(0));
        assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));
    }
}
