//! Per-worker connection pool.
//!
//! A worker keeps the connection it acquired until it releases or discards
//! it; repeated acquisitions by the same worker return the same handle.
//! Free connections are shared between workers, and the pool grows up to
//! `max_clients` entries. At capacity the pool either waits for up to
//! `max_wait` for an entry to become free, or, without `max_wait`, evicts the
//! globally oldest connection (even one still owned by another worker).

pub mod entry;
pub(crate) mod registry;

use std::sync::Arc;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::error::PoolError;
use crate::models::pool_config::PoolConfig;
use crate::models::worker::WorkerId;
use crate::pool::entry::EntryInfo;
use crate::pool::registry::{Claim, Registry};
use crate::udbc::provider::Provider;

pub struct ConnectionPool<P: Provider> {
    provider: P,
    options: P::Options,
    config: PoolConfig,
    registry: Registry<P::Handle>,
}

enum Attempt<H> {
    Acquired(Arc<H>),
    /// Another task is opening this worker's connection.
    Pending,
    Full,
}

impl<P: Provider> ConnectionPool<P> {
    /// Builds an empty pool around `provider`.
    ///
    /// `options` is handed to the provider for every new connection.
    pub fn new(provider: P, config: PoolConfig, options: P::Options) -> Result<Self, PoolError> {
        config.validate()?;
        if let Some(expected) = &config.provider_type {
            if expected != provider.r#type() {
                return Err(PoolError::InvalidProvider {
                    expected: expected.clone(),
                    found: provider.r#type().to_string(),
                });
            }
        }
        debug!(
            "pool created: provider={}, max_clients={:?}, max_wait={:?}",
            provider.r#type(),
            config.max_clients,
            config.max_wait
        );
        Ok(Self {
            provider,
            options,
            config,
            registry: Registry::new(),
        })
    }

    /// Returns the connection owned by `worker`, claiming or creating one if needed.
    pub async fn acquire(&self, worker: WorkerId) -> Result<Arc<P::Handle>, PoolError> {
        let started = Instant::now();
        loop {
            // Armed before inspecting the registry so no release is missed.
            let changed = self.registry.changed().notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let at_capacity = match self.try_acquire(worker).await? {
                Attempt::Acquired(client) => return Ok(client),
                Attempt::Pending => false,
                Attempt::Full => true,
            };

            match self.config.max_wait {
                Some(max_wait) => {
                    if timeout_at(started + max_wait, changed).await.is_err() {
                        warn!(worker = %worker, ?max_wait, "timed out waiting for a free connection");
                        return Err(PoolError::Timeout(max_wait));
                    }
                }
                None => {
                    if !(at_capacity && self.evict_oldest().await?) {
                        changed.await;
                    }
                }
            }
        }
    }

    async fn try_acquire(&self, worker: WorkerId) -> Result<Attempt<P::Handle>, PoolError> {
        if let Some(client) = self.registry.find_by_owner(worker) {
            return Ok(Attempt::Acquired(client));
        }

        let claim = match self.registry.claim_free(worker) {
            Some(claim) => claim,
            None => match self.registry.reserve(worker, self.config.max_clients) {
                Some(claim) => claim,
                None => return Ok(Attempt::Full),
            },
        };

        match claim {
            Claim::Owned(client) => Ok(Attempt::Acquired(client)),
            Claim::Pending => {
                debug!(worker = %worker, "connection for this worker is being opened elsewhere");
                Ok(Attempt::Pending)
            }
            Claim::Ready(client) => {
                debug!(worker = %worker, "claimed free connection");
                Ok(Attempt::Acquired(client))
            }
            Claim::Vacant(refill) => {
                let client = Arc::new(self.connect(worker).await?);
                debug!(worker = %worker, slot = refill.slot(), "refilled vacant slot");
                refill.fill(client.clone());
                Ok(Attempt::Acquired(client))
            }
            Claim::Grow(reservation) => {
                let client = Arc::new(self.connect(worker).await?);
                reservation.commit(client.clone());
                debug!(worker = %worker, size = self.registry.size(), "pool grown");
                Ok(Attempt::Acquired(client))
            }
        }
    }

    async fn connect(&self, worker: WorkerId) -> Result<P::Handle, PoolError> {
        self.provider
            .new_connection(&self.options)
            .await
            .inspect_err(|e| warn!(worker = %worker, "failed to open connection: {}", e))
            .map_err(PoolError::from)
    }

    /// Disposes of the globally oldest connection. Returns `false` if no
    /// entry can be evicted right now.
    async fn evict_oldest(&self) -> Result<bool, PoolError> {
        let Some(eviction) = self.registry.begin_eviction() else {
            return Ok(false);
        };
        warn!(
            slot = eviction.slot(),
            revoked = ?eviction.revoked(),
            "pool at capacity, evicting oldest connection"
        );
        self.provider.close_connection(eviction.client()).await?;
        eviction.finish();
        Ok(true)
    }

    /// Closes `worker`'s connection and frees its entry.
    ///
    /// The closed handle stays in the entry and is handed to the next
    /// claimant as is; handles must reconnect on use. If the provider fails
    /// to close it, the entry stays with `worker`.
    pub async fn release(&self, worker: WorkerId) -> Result<(), PoolError> {
        let Some(release) = self.registry.begin_release(worker) else {
            debug!(worker = %worker, "release: no connection owned");
            return Ok(());
        };
        self.provider.close_connection(release.client()).await?;
        release.finish();
        debug!(worker = %worker, "connection released");
        Ok(())
    }

    /// Frees `worker`'s entry without closing its connection, for handles the
    /// caller already knows to be broken.
    pub fn discard(&self, worker: WorkerId) {
        if self.registry.release(worker) {
            debug!(worker = %worker, "connection discarded");
        }
    }

    /// Closes every connection in the pool. Slots stay, vacant.
    ///
    /// All connections are attempted; the first failure is returned.
    pub async fn close(&self) -> Result<(), PoolError> {
        let mut result = Ok(());
        for eviction in self.registry.begin_eviction_all() {
            let closed = self.provider.close_connection(eviction.client()).await;
            match closed {
                Ok(()) => eviction.finish(),
                Err(e) => {
                    warn!(slot = eviction.slot(), "failed to close connection: {}", e);
                    if result.is_ok() {
                        result = Err(e.into());
                    }
                }
            }
        }
        result
    }

    pub fn size(&self) -> usize {
        self.registry.size()
    }

    pub fn entries(&self) -> Vec<EntryInfo> {
        self.registry.snapshot()
    }

    /// Entry claimed longest ago, whatever its owner.
    pub fn oldest(&self) -> Option<EntryInfo> {
        self.registry.oldest()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}
