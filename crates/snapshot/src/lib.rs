//! Durable snapshots of synchronized collections.
//!
//! A [`Snapshot`] is the raw item list of the last successful fetch plus the
//! instant it completed. Stores are deliberately dumb: read, write, remove,
//! list. Whether a snapshot is still worth using is decided by whoever reads
//! it, never here.

pub mod error;
mod path;
pub mod store;

pub use crate::path::{key_to_path, path_to_key};
pub use crate::store::SnapshotStore;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use prsync_board::Item;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn SnapshotStore + Send + Sync>;

/// The durable counterpart of a cache entry: the items exactly as fetched,
/// and when they were fetched (milliseconds since the Unix epoch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub items: Vec<Item>,
    pub timestamp: i64,
}
impl Snapshot {
    pub fn new(items: Vec<Item>, timestamp: i64) -> Self {
        Self { items, timestamp }
    }

    /// Serialize to the on-disk format, `{"items": [...], "timestamp": ms}`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).or_raise(|| ErrorKind::InvalidData("encode snapshot"))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).or_raise(|| ErrorKind::InvalidData("decode snapshot"))
    }
}
