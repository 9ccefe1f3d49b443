//! Stale-while-revalidate synchronization cache for remote collections.
//!
//! This crate keeps an in-memory, classified view of externally-owned
//! collections (the pull requests of a repository), keyed by
//! [`CollectionKey`](prsync_board::CollectionKey). Memory is authoritative
//! for reads; a [`SnapshotStore`](prsync_snapshot::SnapshotStore) holds a
//! durable copy so a fresh process can render before its first network round
//! trip completes.
//!
//! # Architecture
//! - **[`CacheTable`]**: the authoritative map of entries and fetch states.
//!   Pure data, no I/O.
//! - **[`Synchronizer`]**: decides whether to skip, revalidate or load,
//!   deduplicates concurrent fetches of the same key, and writes results to
//!   the table and the snapshot store. Also the read-only query interface.
//! - **[`CollectionFetcher`]**: the network, supplied by the caller.
//! - **[`Clock`]**: every age computation goes through one, so time can be
//!   controlled in tests.

mod clock;
mod entry;
pub mod error;
mod fetcher;
mod policy;
mod sync;
mod table;

pub use crate::clock::{Clock, ClockHandle, ManualClock, Millis, SystemClock, millis};
pub use crate::entry::{CacheEntry, FetchState};
pub use crate::fetcher::{CollectionFetcher, FetcherHandle};
pub use crate::policy::Policy;
pub use crate::sync::{Builder as SynchronizerBuilder, DEFAULT_NAMESPACE, Synchronizer};
pub use crate::table::CacheTable;
