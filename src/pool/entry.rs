use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::models::worker::WorkerId;

/// One pool slot: a client handle, its current owner and its age.
pub(crate) struct PoolEntry<H> {
    /// `None` between eviction and the next refill of the slot.
    pub(crate) client: Option<Arc<H>>,
    pub(crate) owner: Option<WorkerId>,
    /// Monotonic claim time, used for oldest-first eviction.
    pub(crate) acquired_at: Instant,
    pub(crate) acquired_wall: DateTime<Utc>,
    /// A release or eviction of this slot's client is in flight.
    pub(crate) disposing: bool,
}

impl<H> PoolEntry<H> {
    pub(crate) fn new(client: Arc<H>, owner: WorkerId) -> Self {
        Self {
            client: Some(client),
            owner: Some(owner),
            acquired_at: Instant::now(),
            acquired_wall: Utc::now(),
            disposing: false,
        }
    }

    pub(crate) fn is_free(&self) -> bool {
        self.owner.is_none() && !self.disposing
    }

    pub(crate) fn claim(&mut self, owner: WorkerId) {
        self.owner = Some(owner);
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.acquired_at = Instant::now();
        self.acquired_wall = Utc::now();
    }

    pub(crate) fn info(&self, slot: usize) -> EntryInfo {
        EntryInfo {
            slot,
            owner: self.owner,
            acquired_at: self.acquired_wall,
            connected: self.client.is_some(),
        }
    }
}

/// Read-only view of a pool entry, without the client handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub slot: usize,
    pub owner: Option<WorkerId>,
    pub acquired_at: DateTime<Utc>,
    /// Whether the slot currently holds a client handle.
    pub connected: bool,
}
