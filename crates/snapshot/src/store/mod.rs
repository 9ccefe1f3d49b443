//! Snapshot store trait and implementations.
//!
//! This module defines the `SnapshotStore` trait, a durable key to
//! [`Snapshot`] map that can be swapped (a directory of JSON files, an
//! embedded SQLite database, plain memory) without the cache noticing.

mod directory;
#[cfg(feature = "mock")]
mod memory;
mod ro;
mod sqlite;

pub use self::directory::DirectoryStore;
#[cfg(feature = "mock")]
pub use self::memory::MemoryStore;
pub use self::ro::ReadOnlyStore;
pub use self::sqlite::SqliteStore;
use crate::Snapshot;
use crate::error::Result;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::pin::Pin;

pub(crate) type KeyStream<'a> = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>>;

/// Unified interface for snapshot stores.
///
/// Keys are opaque strings to the store (in practice
/// `<namespace>:<owner>/<name>`). Stores hold no TTL or freshness logic:
/// whoever reads a snapshot compares its timestamp against whatever window
/// they care about.
///
/// # Examples
///
/// ```
/// use prsync_snapshot::{Snapshot, SnapshotStore, error::Result};
///
/// async fn age_of(store: &dyn SnapshotStore, key: &str, now: i64) -> Result<Option<i64>> {
///     Ok(store.read(key).await?.map(|snapshot| now - snapshot.timestamp))
/// }
/// ```
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Name of the configured store, used for logging only.
    fn name(&self) -> &str;

    /// Read the snapshot stored under `key`, if any.
    ///
    /// A missing snapshot is `Ok(None)`, not an error.
    async fn read(&self, key: &str) -> Result<Option<Snapshot>>;

    /// Create or overwrite the snapshot stored under `key`.
    async fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()>;

    /// Remove the snapshot stored under `key`. Removing a snapshot that does
    /// not exist succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Stream every key currently holding a snapshot, in no particular order.
    fn keys<'a>(&'a self) -> KeyStream<'a>;

    /// Collect [`keys()`](Self::keys) into a sorted [`Vec`].
    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.keys().try_collect().await?;
        keys.sort();
        Ok(keys)
    }
}
