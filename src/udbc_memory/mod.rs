//! Loopback provider whose handles are plain in-memory tokens.
//!
//! Used by the demo binary and by tests; it records every handle it opens and
//! closes so pool behaviour can be observed from the outside.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::ProviderError;
use crate::udbc::provider::Provider;

const MEMORY_TYPE: &str = "memory";

#[derive(Debug)]
pub struct MemoryClient {
    id: u64,
    closed: AtomicBool,
}

impl MemoryClient {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reopens the client if the pool closed it. Returns `true` on reconnect.
    pub fn ensure_open(&self) -> bool {
        self.closed.swap(false, Ordering::AcqRel)
    }
}

#[derive(Default)]
pub struct MemoryProvider {
    next_id: AtomicU64,
    created: AtomicUsize,
    closed: Mutex<Vec<u64>>,
    fail_next: AtomicBool,
    fail_next_close: AtomicBool,
    connect_delay: Option<Duration>,
    close_delay: Option<Duration>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `new_connection` take `delay`.
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Makes every `close_connection` take `delay`.
    pub fn close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    /// The next `new_connection` call fails.
    pub fn fail_next_connect(&self) {
        self.fail_next.store(true, Ordering::Release);
    }

    /// The next `close_connection` call fails and leaves the handle open.
    pub fn fail_next_close(&self) {
        self.fail_next_close.store(true, Ordering::Release);
    }

    /// Number of handles opened so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Acquire)
    }

    /// Ids of closed handles, in close order.
    pub fn closed(&self) -> Vec<u64> {
        self.closed.lock().clone()
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    type Handle = MemoryClient;
    type Options = ();

    fn r#type(&self) -> &str {
        MEMORY_TYPE
    }

    async fn new_connection(&self, _options: &()) -> Result<MemoryClient, ProviderError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next.swap(false, Ordering::AcqRel) {
            return Err(ProviderError::Connect("injected connect failure".into()));
        }
        self.created.fetch_add(1, Ordering::AcqRel);
        Ok(MemoryClient {
            id: self.next_id.fetch_add(1, Ordering::AcqRel) + 1,
            closed: AtomicBool::new(false),
        })
    }

    async fn close_connection(&self, handle: &MemoryClient) -> Result<(), ProviderError> {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_next_close.swap(false, Ordering::AcqRel) {
            return Err(ProviderError::Close(format!("injected close failure for {}", handle.id)));
        }
        handle.closed.store(true, Ordering::Release);
        self.closed.lock().push(handle.id);
        Ok(())
    }
}
