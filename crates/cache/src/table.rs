//! Authoritative in-memory state. No I/O happens here.

use crate::clock::Millis;
use crate::entry::{CacheEntry, FetchState};
use prsync_board::CollectionKey;
use std::collections::{HashMap, HashSet};

struct Slot {
    entry: CacheEntry,
    /// When usable data last arrived (fetch or hydration), `0` if it never
    /// did. Unlike `entry.timestamp` this survives [`CacheTable::mark_stale`].
    synced_at: Millis,
}

/// Map from collection key to its entry and fetch state.
///
/// Keys are never evicted by age. The only way an entry disappears is
/// [`invalidate()`](Self::invalidate).
#[derive(Default)]
pub struct CacheTable {
    slots: HashMap<CollectionKey, Slot>,
    states: HashMap<CollectionKey, FetchState>,
    /// Bumped by every invalidation, so work that started before one can
    /// tell its result is no longer wanted.
    generations: HashMap<CollectionKey, u64>,
    /// Keys whose snapshot has already been read once this process.
    hydrated: HashSet<CollectionKey>,
}

impl CacheTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry for `key`, or the canonical empty entry if there is none.
    pub fn get(&self, key: &CollectionKey) -> CacheEntry {
        self.slots.get(key).map(|slot| slot.entry.clone()).unwrap_or_default()
    }

    /// Visible timestamp of the entry for `key`, `0` if absent.
    pub fn timestamp(&self, key: &CollectionKey) -> Millis {
        self.slots.get(key).map(|slot| slot.entry.timestamp).unwrap_or_default()
    }

    pub fn contains(&self, key: &CollectionKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Total replacement of the entry for `key`.
    pub fn set(&mut self, key: &CollectionKey, entry: CacheEntry) {
        let synced_at = if entry.error.is_none() { entry.timestamp } else { 0 };
        self.slots.insert(key.clone(), Slot { entry, synced_at });
    }

    /// Compare-and-set: stores `entry` only if `key` holds no data yet (no
    /// slot at all, or a placeholder that was never populated or failed).
    /// Returns whether the entry was stored.
    pub fn insert_if_absent(&mut self, key: &CollectionKey, entry: CacheEntry) -> bool {
        if self.slots.get(key).is_some_and(|slot| slot.synced_at != 0) {
            return false;
        }
        self.set(key, entry);
        true
    }

    /// Make sure `key` has an entry, inserting the canonical empty one if not.
    pub fn ensure(&mut self, key: &CollectionKey) {
        self.slots.entry(key.clone()).or_insert_with(|| Slot { entry: CacheEntry::empty(), synced_at: 0 });
    }

    /// Reset the visible timestamp to `0` so the entry reads as stale, while
    /// remembering that it still holds data. Returns `false` if there is no
    /// entry.
    pub fn mark_stale(&mut self, key: &CollectionKey) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) => {
                slot.entry.timestamp = 0;
                true
            },
            None => false,
        }
    }

    /// When data for `key` was last synchronized, if ever.
    pub fn synced_at(&self, key: &CollectionKey) -> Option<Millis> {
        self.slots.get(key).map(|slot| slot.synced_at).filter(|&at| at != 0)
    }

    /// Whether `key` holds data synchronized no longer than `staleness` ago.
    pub fn is_usable(&self, key: &CollectionKey, now: Millis, staleness: Millis) -> bool {
        self.synced_at(key).is_some_and(|at| now.saturating_sub(at) <= staleness)
    }

    /// Remove the entry and fetch state for `key`. A subsequent
    /// [`get()`](Self::get) returns the canonical empty entry.
    pub fn invalidate(&mut self, key: &CollectionKey) {
        self.slots.remove(key);
        self.states.remove(key);
        *self.generations.entry(key.clone()).or_default() += 1;
    }

    pub fn generation(&self, key: &CollectionKey) -> u64 {
        self.generations.get(key).copied().unwrap_or_default()
    }

    pub fn fetch_state(&self, key: &CollectionKey) -> FetchState {
        self.states.get(key).copied().unwrap_or_default()
    }

    pub fn set_fetch_state(&mut self, key: &CollectionKey, state: FetchState) {
        if state.is_idle() {
            self.states.remove(key);
        } else {
            self.states.insert(key.clone(), state);
        }
    }

    /// Record that the snapshot for `key` is being read. Returns `true` the
    /// first time only.
    pub fn mark_hydrated(&mut self, key: &CollectionKey) -> bool {
        self.hydrated.insert(key.clone())
    }

    pub fn is_hydrated(&self, key: &CollectionKey) -> bool {
        self.hydrated.contains(key)
    }

    /// Every key holding an entry, sorted.
    pub fn keys(&self) -> Vec<CollectionKey> {
        let mut keys: Vec<_> = self.slots.keys().cloned().collect();
        keys.sort();
        keys
    }
}
