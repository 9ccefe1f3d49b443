use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use prsync_config::{Backend, Config};
use prsync_snapshot::StoreHandle;
use prsync_snapshot::store::{DirectoryStore, MemoryStore, ReadOnlyStore, SqliteStore};
use std::sync::Arc;

/// Open the snapshot store described by `config`.
pub async fn open(config: &Config) -> Result<StoreHandle> {
    let path = config.snapshot_path().or_raise(|| ErrorKind::Config)?;
    let store: StoreHandle = match (config.snapshot.backend, path) {
        (Backend::Directory, Some(path)) => {
            let root = std::path::absolute(&path).or_raise(|| ErrorKind::Store)?;
            Arc::new(DirectoryStore::new("directory", root).or_raise(|| ErrorKind::Store)?)
        },
        (Backend::Sqlite, Some(path)) => {
            Arc::new(SqliteStore::connect("sqlite", path).await.or_raise(|| ErrorKind::Store)?)
        },
        (Backend::Memory, _) | (_, None) => Arc::new(MemoryStore::default()),
    };
    tracing::debug!(store = store.name(), read_only = config.snapshot.read_only, "Opened snapshot store");
    if config.snapshot.read_only {
        return Ok(Arc::new(ReadOnlyStore::new(store)));
    }
    Ok(store)
}
