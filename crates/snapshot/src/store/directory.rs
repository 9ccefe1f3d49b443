//! Directory snapshot store.
//!
//! One JSON file per key under a root directory, accessed via `tokio::fs`.
//! Writes go to a sibling temporary file first and are renamed into place,
//! so a crash mid-write never leaves a truncated snapshot behind.

use crate::error::{ErrorKind, Result};
use crate::path::{key_to_path, path_to_key};
use crate::store::KeyStream;
use crate::{Snapshot, SnapshotStore};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Directory-backed snapshot store.
///
/// # Examples
///
/// ```no_run
/// use prsync_snapshot::store::DirectoryStore;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = DirectoryStore::new("snapshots", "/var/cache/prsync")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DirectoryStore {
    name: String,
    root: PathBuf,
}
impl DirectoryStore {
    /// Create a new directory store, creating `root` if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidRoot(root));
            }
        } else {
            // Only happens once on startup, not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(key_to_path(key)?))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl SnapshotStore for DirectoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> Result<Option<Snapshot>> {
        let path = self.absolute_path(key)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => exn::bail!(Self::map_io_error(e, &path)),
        };
        Snapshot::decode(&bytes).map(Some)
    }

    async fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        let path = self.absolute_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        let bytes = snapshot.encode()?;
        let mut staging = path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        fs::write(&staging, &bytes).await.map_err(|e| Self::map_io_error(e, &staging))?;
        fs::rename(&staging, &path).await.map_err(|e| Self::map_io_error(e, &path))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.absolute_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => exn::bail!(Self::map_io_error(e, &path)),
        }
    }

    fn keys<'a>(&'a self) -> KeyStream<'a> {
        let mut stack = vec![self.root.clone()];
        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue 'dirs,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    let path = entry.path();
                    let file_type = match entry.file_type().await {
                        Ok(file_type) => file_type,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &path))); continue 'entries; },
                    };
                    if file_type.is_dir() {
                        stack.push(path);
                        continue 'entries;
                    }
                    // Staging files and strays are skipped silently.
                    let key = path
                        .strip_prefix(&self.root)
                        .ok()
                        .and_then(path_to_key);
                    if file_type.is_file() && let Some(key) = key {
                        yield Ok(key);
                    }
                }
            }
        })
    }
}

impl DirectoryStore {
    /// Root directory the snapshots are written under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Removes every snapshot (and any stray staging file) under the root.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => exn::bail!(Self::map_io_error(e, &self.root)),
        }
        fs::create_dir_all(&self.root).await.or_raise(|| ErrorKind::InvalidRoot(self.root.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prsync_board::Item;

    fn store() -> (tempfile::TempDir, DirectoryStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new("dir", temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(DirectoryStore::new("name", temp_dir.path()).is_ok());
        assert!(DirectoryStore::new("name", "relative/path").is_err());
    }

    #[test]
    fn test_new_rejects_file_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        let err = DirectoryStore::new("name", &file).err().unwrap();
        assert!(matches!(&*err, ErrorKind::InvalidRoot(_)));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (temp_dir, store) = store();
        let snapshot = Snapshot::new(vec![Item::open(1, "one"), Item::open(2, "two")], 42);
        store.write("prsync:o/r", &snapshot).await.unwrap();
        assert!(temp_dir.path().join("prsync/o/r.json").is_file());
        assert!(!temp_dir.path().join("prsync/o/r.json.tmp").exists());
        assert_eq!(store.read("prsync:o/r").await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_read_missing_is_none() {
        let (_temp_dir, store) = store();
        assert_eq!(store.read("prsync:o/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_corrupt_is_error() {
        let (temp_dir, store) = store();
        std::fs::create_dir_all(temp_dir.path().join("prsync/o")).unwrap();
        std::fs::write(temp_dir.path().join("prsync/o/r.json"), b"{not json").unwrap();
        let err = store.read("prsync:o/r").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_overwrite() {
        let (_temp_dir, store) = store();
        store.write("prsync:o/r", &Snapshot::new(vec![Item::open(1, "old")], 1)).await.unwrap();
        store.write("prsync:o/r", &Snapshot::new(vec![], 2)).await.unwrap();
        assert_eq!(store.read("prsync:o/r").await.unwrap(), Some(Snapshot::new(vec![], 2)));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_temp_dir, store) = store();
        store.write("prsync:o/r", &Snapshot::new(vec![], 1)).await.unwrap();
        store.remove("prsync:o/r").await.unwrap();
        assert_eq!(store.read("prsync:o/r").await.unwrap(), None);
        store.remove("prsync:o/r").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_keys() {
        let (temp_dir, store) = store();
        store.write("prsync:a/one", &Snapshot::new(vec![], 1)).await.unwrap();
        store.write("prsync:b/two.rs", &Snapshot::new(vec![], 1)).await.unwrap();
        store.write("other:a/one", &Snapshot::new(vec![], 1)).await.unwrap();
        std::fs::write(temp_dir.path().join("prsync/a/stray.json.tmp"), b"").unwrap();
        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, ["other:a/one", "prsync:a/one", "prsync:b/two.rs"]);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let (_temp_dir, store) = store();
        assert!(store.read("prsync:../../etc/passwd").await.is_err());
        assert!(store.write("../escape", &Snapshot::new(vec![], 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_clear() {
        let (_temp_dir, store) = store();
        store.write("prsync:a/one", &Snapshot::new(vec![], 1)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
        assert!(store.root().is_dir());
    }
}
