//! The fetch coordinator and the read-only accessors built on top of it.

use crate::clock::{ClockHandle, Millis, SystemClock};
use crate::entry::{CacheEntry, FetchState};
use crate::error::{ErrorKind, Result};
use crate::fetcher::FetcherHandle;
use crate::policy::Policy;
use crate::table::CacheTable;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use prsync_board::{CollectionKey, Item, build_buckets};
use prsync_snapshot::{Snapshot, StoreHandle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::instrument;

pub const DEFAULT_NAMESPACE: &str = "prsync";

/// Handle every caller waiting on the same fetch attaches to.
type InFlight = Shared<BoxFuture<'static, ()>>;

/// A registered fetch, and the generation of the entry it will write.
struct Flight {
    generation: u64,
    handle: InFlight,
}

#[derive(Default)]
struct State {
    table: CacheTable,
    /// One entry per key with a network fetch outstanding, and only then.
    in_flight: HashMap<CollectionKey, Flight>,
}
impl State {
    /// The registered fetch for `key`, unless it was started before the last
    /// invalidation of `key`.
    fn current_flight(&self, key: &CollectionKey) -> Option<InFlight> {
        let generation = self.table.generation(key);
        self.in_flight.get(key).filter(|flight| flight.generation == generation).map(|flight| flight.handle.clone())
    }

    /// Deregister the fetch of `generation`, leaving any newer one alone.
    fn finish_flight(&mut self, key: &CollectionKey, generation: u64) {
        if self.table.generation(key) == generation {
            self.table.set_fetch_state(key, FetchState::Idle);
        }
        if self.in_flight.get(key).is_some_and(|flight| flight.generation == generation) {
            self.in_flight.remove(key);
        }
    }
}

struct Inner {
    fetcher: FetcherHandle,
    store: StoreHandle,
    clock: ClockHandle,
    policy: Policy,
    namespace: String,
    state: Mutex<State>,
}

enum Plan {
    /// Cached data is fresh.
    Skip,
    /// Fetch, leaving current data visible.
    Revalidate,
    /// Fetch, with nothing usable to show meanwhile.
    Load,
}

/// Keeps remote collections synchronized into a classified, in-memory board.
///
/// One instance per process, cloned (cheaply) into every collaborator that
/// needs it. All shared state sits behind a single lock that is never held
/// across an `.await`; the only suspension points are the network fetch and
/// snapshot store I/O.
///
/// Guarantees:
/// - at most one network fetch per key at any time; concurrent callers attach
///   to the outstanding one and observe its result,
/// - data younger than the freshness window is served without any fetch,
/// - data younger than the staleness window stays visible while it is
///   revalidated, and survives a failed fetch untouched,
/// - public operations never fail: failures become data on the entry.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

/// Builder for a [`Synchronizer`].
pub struct Builder {
    fetcher: FetcherHandle,
    store: StoreHandle,
    clock: Option<ClockHandle>,
    policy: Policy,
    namespace: String,
}
impl Builder {
    pub fn clock(mut self, clock: ClockHandle) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Prefix for snapshot storage keys, see
    /// [`CollectionKey::storage_key()`].
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn build(self) -> Result<Synchronizer> {
        if self.namespace.is_empty() {
            exn::bail!(ErrorKind::InvalidPolicy("snapshot namespace must not be empty"));
        }
        Ok(Synchronizer {
            inner: Arc::new(Inner {
                fetcher: self.fetcher,
                store: self.store,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                policy: self.policy,
                namespace: self.namespace,
                state: Mutex::new(State::default()),
            }),
        })
    }
}

impl Synchronizer {
    pub fn builder(fetcher: FetcherHandle, store: StoreHandle) -> Builder {
        Builder {
            fetcher,
            store,
            clock: None,
            policy: Policy::default(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.inner.policy
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Critical sections are a handful of infallible map operations, so a
        // poisoned lock still guards consistent state.
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn storage_key(&self, key: &CollectionKey) -> String {
        key.storage_key(&self.inner.namespace)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current entry for `key`: the canonical empty entry if nothing is
    /// known. Never fetches, never blocks on I/O.
    pub fn entry(&self, key: &CollectionKey) -> CacheEntry {
        self.lock().table.get(key)
    }

    pub fn fetch_state(&self, key: &CollectionKey) -> FetchState {
        self.lock().table.fetch_state(key)
    }

    /// Whether a network fetch for `key` is outstanding right now.
    pub fn is_fetching(&self, key: &CollectionKey) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    /// Every key with an entry in memory.
    pub fn keys(&self) -> Vec<CollectionKey> {
        self.lock().table.keys()
    }

    /// Whether memory, or failing that the snapshot store, holds data for
    /// `key` within the staleness window. Reads the store if needed but never
    /// changes any state.
    ///
    /// The store is only consulted while its snapshot could still be
    /// hydrated: once it has been read (even if the entry was invalidated
    /// since), only memory counts.
    pub async fn has_usable_cached_data(&self, key: &CollectionKey) -> bool {
        let now = self.inner.clock.now();
        let staleness = self.inner.policy.staleness();
        let (in_memory, hydrated) = {
            let state = self.lock();
            (state.table.is_usable(key, now, staleness), state.table.is_hydrated(key))
        };
        if in_memory {
            return true;
        }
        // A snapshot is only ever read once; after that it cannot back a fetch.
        if hydrated {
            return false;
        }
        match self.inner.store.read(&self.storage_key(key)).await {
            Ok(Some(snapshot)) => now.saturating_sub(snapshot.timestamp) <= staleness,
            Ok(None) => false,
            Err(err) => {
                tracing::debug!(store = self.inner.store.name(), key = %key, error = ?err, "Snapshot unreadable");
                false
            },
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Bring `key` up to date according to the [`Policy`].
    ///
    /// Returns once the entry is as fresh as this call is going to make it:
    /// immediately when cached data is fresh (and `force` is unset),
    /// otherwise when the (possibly shared) network fetch has completed and
    /// its result has been written.
    #[instrument(skip_all, fields(key = %key, force = force))]
    pub async fn fetch(&self, key: &CollectionKey, force: bool) {
        let existing = self.lock().current_flight(key);
        if let Some(pending) = existing {
            tracing::debug!("Joining in-flight fetch");
            pending.await;
            return;
        }
        self.hydrate_now(key).await;
        let pending = 'attach: {
            let mut state = self.lock();
            // Someone else started while the snapshot was being read.
            if let Some(pending) = state.current_flight(key) {
                break 'attach pending;
            }
            let now = self.inner.clock.now();
            let fetch_state = match self.plan(&state.table, key, now, force) {
                Plan::Skip => {
                    tracing::debug!("Cached data is fresh; skipping fetch");
                    return;
                },
                Plan::Revalidate => FetchState::Revalidating,
                Plan::Load => FetchState::Loading,
            };
            let generation = state.table.generation(key);
            // A fetch started before an invalidation is still running. The new
            // one queues behind it, so the remote only ever sees one request.
            let superseded = state.in_flight.get(key).map(|flight| flight.handle.clone());
            state.table.ensure(key);
            state.table.set_fetch_state(key, fetch_state);
            let handle = self.spawn_fetch(key, generation, superseded);
            state.in_flight.insert(key.clone(), Flight { generation, handle: handle.clone() });
            handle
        };
        pending.await;
    }

    /// Force a revalidation of `key`, keeping its current data visible while
    /// it runs.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn refresh(&self, key: &CollectionKey) {
        self.lock().table.mark_stale(key);
        self.fetch(key, true).await;
    }

    /// Speculatively warm `key` in the background. Nobody needs to await the
    /// returned handle; failures only ever show up on the entry.
    pub fn prefetch(&self, key: &CollectionKey) -> JoinHandle<()> {
        let this = self.clone();
        let key = key.clone();
        tokio::spawn(async move { this.fetch(&key, false).await })
    }

    /// Load the snapshot for `key` into memory in the background, unless the
    /// key already has an entry or its snapshot has been read before.
    ///
    /// Resolves to whether the snapshot was used. A snapshot never
    /// overwrites data that arrived in the meantime.
    pub fn hydrate(&self, key: &CollectionKey) -> JoinHandle<bool> {
        let this = self.clone();
        let key = key.clone();
        tokio::spawn(async move { this.hydrate_now(&key).await })
    }

    /// Forget everything held in memory for `key`. The snapshot is left in
    /// place but is not read again by this process.
    pub fn invalidate(&self, key: &CollectionKey) {
        self.lock().table.invalidate(key);
        tracing::debug!(key = %key, "Invalidated cache entry");
    }

    /// [`invalidate()`](Self::invalidate), and also delete the snapshot.
    pub async fn purge(&self, key: &CollectionKey) {
        self.invalidate(key);
        let storage_key = self.storage_key(key);
        if let Err(err) = self.inner.store.remove(&storage_key).await {
            tracing::warn!(store = self.inner.store.name(), key = %storage_key, error = ?err, "Failed to remove snapshot");
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn plan(&self, table: &CacheTable, key: &CollectionKey, now: Millis, force: bool) -> Plan {
        let policy = &self.inner.policy;
        let usable = table.is_usable(key, now, policy.staleness());
        let timestamp = table.timestamp(key);
        let age = now.saturating_sub(timestamp);
        if usable && !force && timestamp != 0 && age <= policy.freshness() {
            Plan::Skip
        } else if usable || (force && table.synced_at(key).is_some()) {
            Plan::Revalidate
        } else {
            Plan::Load
        }
    }

    /// Must be called with the state lock held, so the registration lands
    /// before the task can try to remove it.
    fn spawn_fetch(&self, key: &CollectionKey, generation: u64, superseded: Option<InFlight>) -> InFlight {
        let run = self.clone().run(key.clone(), generation);
        let task = tokio::spawn(async move {
            if let Some(previous) = superseded {
                previous.await;
            }
            run.await;
        });
        let this = self.clone();
        let key = key.clone();
        async move {
            if let Err(err) = task.await {
                tracing::error!(key = %key, error = %err, "Fetch task did not complete");
                this.lock().finish_flight(&key, generation);
            }
        }
        .boxed()
        .shared()
    }

    async fn run(self, key: CollectionKey, generation: u64) {
        let started = Instant::now();
        let result = self.call_fetcher(&key).await;
        let now = self.inner.clock.now();
        let snapshot = {
            let mut state = self.lock();
            if state.table.generation(&key) != generation {
                tracing::debug!(key = %key, "Entry invalidated mid-fetch; discarding result");
                None
            } else {
                match result {
                    Ok(items) => {
                        tracing::info!(
                            key = %key,
                            items = items.len(),
                            elapsed_ms = started.elapsed().as_millis(),
                            "Fetched collection"
                        );
                        state.table.set(&key, CacheEntry::fetched(build_buckets(&items), now));
                        Some(Snapshot::new(items, now))
                    },
                    Err(err) => {
                        let message = (*err).to_string();
                        if state.table.is_usable(&key, now, self.inner.policy.staleness()) {
                            tracing::warn!(key = %key, error = ?err, "Fetch failed; still serving cached data");
                        } else {
                            tracing::warn!(key = %key, error = ?err, "Fetch failed with no usable cached data");
                            state.table.set(&key, CacheEntry::failed(message));
                        }
                        None
                    },
                }
            }
        };
        if let Some(snapshot) = snapshot {
            self.persist(&key, &snapshot).await;
        }
        // Deregistering is the very last step. Until it happens, new callers
        // join this fetch instead of starting a duplicate.
        self.lock().finish_flight(&key, generation);
    }

    async fn call_fetcher(&self, key: &CollectionKey) -> Result<Vec<Item>> {
        let fetch = self.inner.fetcher.fetch(key);
        match self.inner.policy.fetch_timeout() {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(result) => result,
                Err(_elapsed) => Err(exn::Exn::from(ErrorKind::Timeout(limit))),
            },
            None => fetch.await,
        }
    }

    async fn persist(&self, key: &CollectionKey, snapshot: &Snapshot) {
        let storage_key = self.storage_key(key);
        if let Err(err) = self.inner.store.write(&storage_key, snapshot).await {
            // Snapshots only speed up the next start; losing one is harmless.
            tracing::warn!(store = self.inner.store.name(), key = %storage_key, error = ?err, "Failed to persist snapshot");
        }
    }

    async fn hydrate_now(&self, key: &CollectionKey) -> bool {
        let generation = {
            let mut state = self.lock();
            if state.table.contains(key) || !state.table.mark_hydrated(key) {
                return false;
            }
            state.table.generation(key)
        };
        let storage_key = self.storage_key(key);
        let snapshot = match self.inner.store.read(&storage_key).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return false,
            Err(err) => {
                tracing::warn!(store = self.inner.store.name(), key = %storage_key, error = ?err, "Failed to read snapshot");
                return false;
            },
        };
        let now = self.inner.clock.now();
        if now.saturating_sub(snapshot.timestamp) > self.inner.policy.staleness() {
            tracing::debug!(key = %key, timestamp = snapshot.timestamp, "Snapshot older than staleness window; ignored");
            return false;
        }
        let items = snapshot.items.len();
        let entry = CacheEntry::fetched(build_buckets(&snapshot.items), snapshot.timestamp);
        let mut state = self.lock();
        if state.table.generation(key) != generation || !state.table.insert_if_absent(key, entry) {
            return false;
        }
        if state.table.fetch_state(key).is_loading() {
            state.table.set_fetch_state(key, FetchState::Revalidating);
        }
        tracing::debug!(key = %key, items, "Hydrated entry from snapshot");
        true
    }
}
