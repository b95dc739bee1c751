use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::models::worker::WorkerId;
use crate::pool::entry::{EntryInfo, PoolEntry};

struct Slots<H> {
    entries: Vec<PoolEntry<H>>,
    /// Workers whose growth reservation is still creating a client.
    growing: Vec<WorkerId>,
}

impl<H> Slots<H> {
    fn oldest(&self, filter: impl Fn(&PoolEntry<H>) -> bool) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| filter(*e))
            .min_by_key(|(_, e)| e.acquired_at)
            .map(|(slot, _)| slot)
    }

    /// What `worker` already holds, if anything.
    ///
    /// A worker owns at most one entry, and a worker that is still
    /// refilling or growing must not start a second attempt.
    fn held<'a>(&self, worker: WorkerId) -> Option<Claim<'a, H>> {
        if let Some(entry) = self.entries.iter().find(|e| e.owner == Some(worker)) {
            return Some(match &entry.client {
                Some(client) => Claim::Owned(client.clone()),
                None => Claim::Pending,
            });
        }
        self.growing.contains(&worker).then_some(Claim::Pending)
    }

    fn connected_owned_by(&self, worker: WorkerId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.owner == Some(worker) && e.client.is_some())
    }
}

/// Shared collection of pool entries.
///
/// Every operation takes the lock once and completes before returning, so
/// the lock is never held across an `.await`. Entries are never removed:
/// slots are recycled in place and slot indices stay stable.
pub(crate) struct Registry<H> {
    slots: Mutex<Slots<H>>,
    changed: Notify,
}

/// Result of [`Registry::claim_free`] and [`Registry::reserve`].
pub(crate) enum Claim<'a, H> {
    /// The worker already owns this client.
    Owned(Arc<H>),
    /// The worker's own refill or growth is in flight on another task.
    Pending,
    /// A free entry holding a client.
    Ready(Arc<H>),
    /// A free entry whose client was evicted; it must be refilled.
    Vacant(Refill<'a, H>),
    /// Room for a new entry.
    Grow(Reservation<'a, H>),
}

impl<H> Registry<H> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                entries: Vec::new(),
                growing: Vec::new(),
            }),
            changed: Notify::new(),
        }
    }

    /// Signalled whenever an entry may have become claimable or evictable.
    pub(crate) fn changed(&self) -> &Notify {
        &self.changed
    }

    pub(crate) fn size(&self) -> usize {
        self.slots.lock().entries.len()
    }

    pub(crate) fn find_by_owner(&self, worker: WorkerId) -> Option<Arc<H>> {
        let slots = self.slots.lock();
        slots
            .entries
            .iter()
            .find(|e| e.owner == Some(worker))
            .and_then(|e| e.client.clone())
    }

    /// Claims a free entry for `worker`, preferring ones that still hold a client.
    pub(crate) fn claim_free(&self, worker: WorkerId) -> Option<Claim<'_, H>> {
        let mut slots = self.slots.lock();
        if let Some(held) = slots.held(worker) {
            return Some(held);
        }
        let slot = slots
            .entries
            .iter()
            .position(|e| e.is_free() && e.client.is_some())
            .or_else(|| slots.entries.iter().position(PoolEntry::is_free))?;
        let entry = &mut slots.entries[slot];
        entry.claim(worker);
        Some(match &entry.client {
            Some(client) => Claim::Ready(client.clone()),
            None => Claim::Vacant(Refill {
                registry: self,
                slot,
                done: false,
            }),
        })
    }

    /// Reserves room for one more entry owned by `worker` unless
    /// `max_clients` is reached.
    pub(crate) fn reserve(&self, worker: WorkerId, max_clients: Option<usize>) -> Option<Claim<'_, H>> {
        let mut slots = self.slots.lock();
        if let Some(held) = slots.held(worker) {
            return Some(held);
        }
        if let Some(max) = max_clients {
            if slots.entries.len() + slots.growing.len() >= max {
                return None;
            }
        }
        slots.growing.push(worker);
        Some(Claim::Grow(Reservation {
            registry: self,
            worker,
            committed: false,
        }))
    }

    /// Entry claimed longest ago, whatever its owner.
    pub(crate) fn oldest(&self) -> Option<EntryInfo> {
        let slots = self.slots.lock();
        slots.oldest(|_| true).map(|slot| slots.entries[slot].info(slot))
    }

    /// Marks the oldest connected entry for disposal and revokes its owner.
    pub(crate) fn begin_eviction(&self) -> Option<Eviction<'_, H>> {
        let mut slots = self.slots.lock();
        let slot = slots.oldest(|e| e.client.is_some() && !e.disposing)?;
        self.mark_evicting(&mut *slots, slot)
    }

    /// Marks every connected entry for disposal.
    pub(crate) fn begin_eviction_all(&self) -> Vec<Eviction<'_, H>> {
        let mut slots = self.slots.lock();
        let candidates: Vec<usize> = (0..slots.entries.len())
            .filter(|&slot| {
                let e = &slots.entries[slot];
                e.client.is_some() && !e.disposing
            })
            .collect();
        candidates
            .into_iter()
            .filter_map(|slot| self.mark_evicting(&mut *slots, slot))
            .collect()
    }

    fn mark_evicting(&self, slots: &mut Slots<H>, slot: usize) -> Option<Eviction<'_, H>> {
        let entry = &mut slots.entries[slot];
        let client = entry.client.clone()?;
        entry.disposing = true;
        let revoked = entry.owner.take();
        Some(Eviction {
            registry: self,
            slot,
            client,
            revoked,
            done: false,
        })
    }

    /// Marks `worker`'s entry for disposal, keeping its owner until finished.
    pub(crate) fn begin_release(&self, worker: WorkerId) -> Option<Release<'_, H>> {
        let mut slots = self.slots.lock();
        let slot = slots.connected_owned_by(worker)?;
        let entry = &mut slots.entries[slot];
        if entry.disposing {
            return None;
        }
        let client = entry.client.clone()?;
        entry.disposing = true;
        Some(Release {
            registry: self,
            slot,
            client,
            done: false,
        })
    }

    /// Clears the owner of `worker`'s entry, keeping its client.
    ///
    /// An entry still being refilled stays with its worker.
    pub(crate) fn release(&self, worker: WorkerId) -> bool {
        let released = {
            let mut slots = self.slots.lock();
            match slots.connected_owned_by(worker) {
                Some(slot) => {
                    slots.entries[slot].owner = None;
                    true
                }
                None => false,
            }
        };
        if released {
            self.changed.notify_waiters();
        }
        released
    }

    pub(crate) fn snapshot(&self) -> Vec<EntryInfo> {
        let slots = self.slots.lock();
        slots
            .entries
            .iter()
            .enumerate()
            .map(|(slot, e)| e.info(slot))
            .collect()
    }

    fn update(&self, f: impl FnOnce(&mut Slots<H>)) {
        {
            let mut slots = self.slots.lock();
            f(&mut *slots);
        }
        self.changed.notify_waiters();
    }
}

/// Room for one new entry; cancelled on drop unless committed.
pub(crate) struct Reservation<'a, H> {
    registry: &'a Registry<H>,
    worker: WorkerId,
    committed: bool,
}

impl<H> Reservation<'_, H> {
    fn cancel(slots: &mut Slots<H>, worker: WorkerId) {
        if let Some(pos) = slots.growing.iter().position(|w| *w == worker) {
            slots.growing.swap_remove(pos);
        }
    }

    /// Appends the new entry, owned by the reserving worker.
    pub(crate) fn commit(mut self, client: Arc<H>) {
        self.committed = true;
        let worker = self.worker;
        self.registry.update(|slots| {
            Self::cancel(slots, worker);
            slots.entries.push(PoolEntry::new(client, worker));
        });
    }
}

impl<H> Drop for Reservation<'_, H> {
    fn drop(&mut self) {
        if !self.committed {
            let worker = self.worker;
            self.registry.update(|slots| Self::cancel(slots, worker));
        }
    }
}

/// A claimed slot without a client; freed on drop unless filled.
pub(crate) struct Refill<'a, H> {
    registry: &'a Registry<H>,
    slot: usize,
    done: bool,
}

impl<H> Refill<'_, H> {
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn fill(mut self, client: Arc<H>) {
        self.done = true;
        let slot = self.slot;
        self.registry.update(|slots| {
            let entry = &mut slots.entries[slot];
            entry.client = Some(client);
            entry.touch();
        });
    }
}

impl<H> Drop for Refill<'_, H> {
    fn drop(&mut self) {
        if !self.done {
            let slot = self.slot;
            self.registry
                .update(|slots| slots.entries[slot].owner = None);
        }
    }
}

/// An entry whose client is being disposed of; un-marked on drop unless finished.
pub(crate) struct Eviction<'a, H> {
    registry: &'a Registry<H>,
    slot: usize,
    client: Arc<H>,
    revoked: Option<WorkerId>,
    done: bool,
}

impl<H> Eviction<'_, H> {
    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    pub(crate) fn client(&self) -> &H {
        &self.client
    }

    /// Worker that owned the entry when the eviction began.
    pub(crate) fn revoked(&self) -> Option<WorkerId> {
        self.revoked
    }

    /// Leaves the slot free and vacant.
    pub(crate) fn finish(mut self) {
        self.done = true;
        let slot = self.slot;
        self.registry.update(|slots| {
            let entry = &mut slots.entries[slot];
            entry.client = None;
            entry.owner = None;
            entry.disposing = false;
        });
    }
}

impl<H> Drop for Eviction<'_, H> {
    fn drop(&mut self) {
        if !self.done {
            let slot = self.slot;
            self.registry
                .update(|slots| slots.entries[slot].disposing = false);
        }
    }
}

/// A worker's entry whose client is being closed on release.
///
/// Finishing frees the entry and keeps the client in it; dropping it
/// unfinished leaves the entry with its owner.
pub(crate) struct Release<'a, H> {
    registry: &'a Registry<H>,
    slot: usize,
    client: Arc<H>,
    done: bool,
}

impl<H> Release<'_, H> {
    pub(crate) fn client(&self) -> &H {
        &self.client
    }

    pub(crate) fn finish(mut self) {
        self.done = true;
        let slot = self.slot;
        self.registry.update(|slots| {
            let entry = &mut slots.entries[slot];
            entry.owner = None;
            entry.disposing = false;
        });
    }
}

impl<H> Drop for Release<'_, H> {
    fn drop(&mut self) {
        if !self.done {
            let slot = self.slot;
            self.registry
                .update(|slots| slots.entries[slot].disposing = false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(registry: &Registry<u32>, worker: WorkerId, max: Option<usize>) -> Option<Reservation<'_, u32>> {
        match registry.reserve(worker, max)? {
            Claim::Grow(reservation) => Some(reservation),
            _ => panic!("expected a growth reservation"),
        }
    }

    fn grow(registry: &Registry<u32>, worker: WorkerId, client: u32) {
        reservation(registry, worker, None)
            .expect("unbounded reserve")
            .commit(Arc::new(client));
    }

    #[test]
    fn test_reserve_respects_capacity() {
        let registry = Registry::<u32>::new();
        let first = reservation(&registry, WorkerId::next(), Some(1)).expect("room for one");
        assert!(registry.reserve(WorkerId::next(), Some(1)).is_none());
        drop(first);
        assert_eq!(registry.size(), 0);
        assert!(reservation(&registry, WorkerId::next(), Some(1)).is_some());
    }

    #[test]
    fn test_worker_holds_at_most_one_entry() {
        let registry = Registry::<u32>::new();
        let a = WorkerId::next();

        let growing = reservation(&registry, a, None).expect("room");
        assert!(matches!(registry.reserve(a, None), Some(Claim::Pending)));
        assert!(matches!(registry.claim_free(a), Some(Claim::Pending)));
        growing.commit(Arc::new(1));

        assert!(matches!(registry.reserve(a, None), Some(Claim::Owned(c)) if *c == 1));
        assert!(matches!(registry.claim_free(a), Some(Claim::Owned(c)) if *c == 1));
        assert_eq!(registry.size(), 1);
    }

    #[test]
    fn test_refilling_entry_cannot_be_released() {
        let registry = Registry::<u32>::new();
        let (a, b) = (WorkerId::next(), WorkerId::next());
        grow(&registry, a, 1);
        registry.begin_eviction().expect("one entry").finish();

        let refill = match registry.claim_free(b) {
            Some(Claim::Vacant(refill)) => refill,
            _ => panic!("expected the vacant entry"),
        };
        assert!(!registry.release(b));
        assert!(registry.claim_free(WorkerId::next()).is_none());
        refill.fill(Arc::new(2));
        assert!(registry.release(b));
    }

    #[test]
    fn test_claim_prefers_connected_entries() {
        let registry = Registry::<u32>::new();
        let (a, b, c) = (WorkerId::next(), WorkerId::next(), WorkerId::next());
        grow(&registry, a, 1);
        grow(&registry, b, 2);

        registry.begin_eviction().expect("slot 0 is oldest").finish();
        assert!(registry.release(b));

        match registry.claim_free(c) {
            Some(Claim::Ready(client)) => assert_eq!(*client, 2),
            _ => panic!("expected the connected entry"),
        }
        match registry.claim_free(a) {
            Some(Claim::Vacant(refill)) => {
                assert_eq!(refill.slot(), 0);
                refill.fill(Arc::new(3));
            }
            _ => panic!("expected the vacant entry"),
        }
        assert_eq!(registry.find_by_owner(a).as_deref(), Some(&3));
        assert!(registry.claim_free(WorkerId::next()).is_none());
    }

    #[test]
    fn test_dropped_refill_frees_slot() {
        let registry = Registry::<u32>::new();
        let a = WorkerId::next();
        grow(&registry, a, 1);
        registry.begin_eviction().expect("one entry").finish();

        let b = WorkerId::next();
        match registry.claim_free(b) {
            Some(Claim::Vacant(refill)) => drop(refill),
            _ => panic!("expected the vacant entry"),
        }
        let info = registry.snapshot();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].owner, None);
        assert!(!info[0].connected);
    }

    #[test]
    fn test_eviction_revokes_owner_and_is_exclusive() {
        let registry = Registry::<u32>::new();
        let a = WorkerId::next();
        grow(&registry, a, 1);

        let eviction = registry.begin_eviction().expect("one entry");
        assert_eq!(eviction.revoked(), Some(a));
        assert_eq!(*eviction.client(), 1);
        assert!(registry.find_by_owner(a).is_none());
        assert!(registry.begin_eviction().is_none());
        assert!(registry.claim_free(WorkerId::next()).is_none());

        drop(eviction);
        assert!(matches!(
            registry.claim_free(WorkerId::next()),
            Some(Claim::Ready(_))
        ));
    }

    #[test]
    fn test_release_in_flight_is_not_evicted() {
        let registry = Registry::<u32>::new();
        let a = WorkerId::next();
        grow(&registry, a, 1);

        let release = registry.begin_release(a).expect("a owns an entry");
        assert_eq!(*release.client(), 1);
        assert!(registry.begin_eviction().is_none());
        assert!(registry.begin_release(a).is_none());

        drop(release);
        assert_eq!(registry.find_by_owner(a).as_deref(), Some(&1));

        registry.begin_release(a).expect("still owned").finish();
        let info = registry.snapshot();
        assert_eq!(info[0].owner, None);
        assert!(info[0].connected);
        assert!(registry.begin_eviction().is_some());
    }

    #[test]
    fn test_oldest_ignores_ownership() {
        let registry = Registry::<u32>::new();
        let (a, b) = (WorkerId::next(), WorkerId::next());
        grow(&registry, a, 1);
        std::thread::sleep(std::time::Duration::from_millis(2));
        grow(&registry, b, 2);
        assert!(registry.release(b));
        assert_eq!(registry.oldest().map(|e| e.slot), Some(0));
    }
}
