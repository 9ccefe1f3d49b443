//! In-memory snapshot store for testing.

use super::KeyStream;
use crate::error::{ErrorKind, Result};
use crate::path::key_to_path;
use crate::{Snapshot, SnapshotStore};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory snapshot store for testing.
///
/// Snapshots are stored in a `HashMap` behind a [`RwLock`], so all trait
/// methods operate on `&self` without external synchronisation. The store
/// counts reads and writes, and can be switched into a failing mode to
/// exercise a caller's handling of persistence errors.
///
/// # Examples
///
/// ```
/// use prsync_snapshot::{Snapshot, SnapshotStore, store::MemoryStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::with_snapshots([("prsync:o/r", Snapshot::new(vec![], 1))]);
/// assert!(store.read("prsync:o/r").await?.is_some());
/// assert_eq!(store.reads(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    name: String,
    snapshots: RwLock<HashMap<String, Snapshot>>,
    failing: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create a memory store pre-populated with snapshots.
    ///
    /// Panics if any key fails validation. If test setup is wrong, then test
    /// should not pass.
    pub fn with_snapshots(snapshots: impl IntoIterator<Item = (impl Into<String>, Snapshot)>) -> Self {
        let mut map = HashMap::new();
        for (key, snapshot) in snapshots {
            let key = key.into();
            if key_to_path(&key).is_err() {
                // The panic here is DELIBERATE. There is no error result.
                panic!("MemoryStore::with_snapshots: invalid key {key}");
            }
            map.insert(key, snapshot);
        }
        Self {
            name: "memory".to_string(),
            snapshots: RwLock::new(map),
            failing: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Change the name of the memory store.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make every subsequent operation fail (or succeed again) with a
    /// backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `read` calls made so far, including failed ones.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `write` calls made so far, including failed ones.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Peek at a stored snapshot without counting it as a read.
    pub async fn get(&self, key: &str) -> Option<Snapshot> {
        self.snapshots.read().await.get(key).cloned()
    }

    fn check(&self, key: &str) -> Result<()> {
        key_to_path(key)?;
        if self.failing.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::BackendError(format!("{} is failing on purpose", self.name)));
        }
        Ok(())
    }
}
impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_snapshots(std::iter::empty::<(String, Snapshot)>())
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> Result<Option<Snapshot>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check(key)?;
        Ok(self.snapshots.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check(key)?;
        self.snapshots.write().await.insert(key.to_string(), snapshot.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check(key)?;
        self.snapshots.write().await.remove(key);
        Ok(())
    }

    fn keys<'a>(&'a self) -> KeyStream<'a> {
        Box::pin(stream! {
            // Snapshot the keys under the read lock, then drop it before
            // yielding to avoid holding the lock across yield points.
            let keys: Vec<String> = self.snapshots.read().await.keys().cloned().collect();
            for key in keys {
                yield Ok(key);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prsync_board::Item;

    #[tokio::test]
    async fn test_write_and_read() {
        let store = MemoryStore::default();
        let snapshot = Snapshot::new(vec![Item::open(1, "one")], 5);
        store.write("ns:o/r", &snapshot).await.unwrap();
        assert_eq!(store.read("ns:o/r").await.unwrap(), Some(snapshot));
        assert_eq!((store.reads(), store.writes()), (1, 1));
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let store = MemoryStore::with_snapshots([("ns:o/r", Snapshot::new(vec![], 1))]);
        store.set_failing(true);
        let err = store.read("ns:o/r").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BackendError(_)));
        assert!(store.write("ns:o/r", &Snapshot::new(vec![], 2)).await.is_err());
        store.set_failing(false);
        assert_eq!(store.read("ns:o/r").await.unwrap(), Some(Snapshot::new(vec![], 1)));
    }

    #[tokio::test]
    async fn test_list_keys_sorted() {
        let store = MemoryStore::with_snapshots([
            ("ns:b/two", Snapshot::new(vec![], 1)),
            ("ns:a/one", Snapshot::new(vec![], 1)),
        ]);
        assert_eq!(store.list_keys().await.unwrap(), ["ns:a/one", "ns:b/two"]);
    }

    #[test]
    #[should_panic(expected = "invalid key")]
    fn test_with_snapshots_panics_on_bad_key() {
        MemoryStore::with_snapshots([("../escape", Snapshot::new(vec![], 1))]);
    }
}
