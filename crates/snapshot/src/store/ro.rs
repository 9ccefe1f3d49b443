//! Read-only snapshot store.
//!
//! Wraps another store and drops write operations while reporting success.
//! Useful for pointing a second process at a snapshot directory it must not
//! touch.

use async_trait::async_trait;

use crate::store::KeyStream;
use crate::{Snapshot, SnapshotStore, StoreHandle, error::Result};

/// Read-only snapshot store.
///
/// Wraps another store and silently drops all writes and removals, logging
/// an [`info event`](tracing::Event).
#[derive(Clone)]
pub struct ReadOnlyStore {
    inner: StoreHandle,
}
impl ReadOnlyStore {
    pub fn new(inner: StoreHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl SnapshotStore for ReadOnlyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read(&self, key: &str) -> Result<Option<Snapshot>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        tracing::info!(store = self.name(), key, items = snapshot.items.len(), "Skipping snapshot write during read-only mode");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        tracing::info!(store = self.name(), key, "Skipping snapshot removal during read-only mode");
        Ok(())
    }

    fn keys<'a>(&'a self) -> KeyStream<'a> {
        self.inner.keys()
    }
}
