//! SQLite snapshot store.
//!
//! Snapshots live in a single `snapshots` table; items are stored as their
//! JSON encoding so the row format matches the file format byte for byte.

use crate::error::{ErrorKind, Result};
use crate::store::KeyStream;
use crate::{Snapshot, SnapshotStore};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use futures::TryStreamExt;
use prsync_board::Item;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use tracing::instrument;

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// Snapshot traffic is one read per key per process plus one write per fetch.
const MAX_CONNECTIONS: u32 = 4;

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    items: String,
    timestamp: i64,
}
impl TryFrom<SnapshotRow> for Snapshot {
    type Error = crate::error::Error;
    fn try_from(row: SnapshotRow) -> Result<Self> {
        let items: Vec<Item> = serde_json::from_str(&row.items).or_raise(|| ErrorKind::InvalidData("items"))?;
        Ok(Snapshot::new(items, row.timestamp))
    }
}

/// SQLite-backed snapshot store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    name: String,
    pool: SqlitePool,
}

impl SqliteStore {
    async fn new(name: String, options: SqliteConnectOptions, max: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Apply the query-based PRAGMAs to EVERY connection in the pool,
            // not only the first one.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max.unwrap_or(MAX_CONNECTIONS))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let store = Self { name, pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Connect to the snapshot database at the given path.
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn connect(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(ErrorKind::Io)?;
        }
        let options = Self::base_options().filename(path).create_if_missing(true);
        Self::new(name.into(), options, None).await
    }

    /// Connect to an in-memory database.
    ///
    /// Note: do NOT apply `#[cfg(test)]` so that other crates can also use
    /// this in their tests.
    pub async fn connect_in_memory(name: impl Into<String>) -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Parallel connections to `:memory:` would each see their own,
        // different database. Limit to one.
        Self::new(name.into(), options, Some(1)).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Several processes may share one snapshot database.
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA temp_store = MEMORY;
                PRAGMA cache_size = -4096;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("performing snapshot database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool. The store should not be used
    /// afterwards.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> Result<Option<Snapshot>> {
        let row: Option<SnapshotRow> = sqlx::query_as("SELECT items, timestamp FROM snapshots WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Snapshot::try_from).transpose()
    }

    async fn write(&self, key: &str, snapshot: &Snapshot) -> Result<()> {
        let items = serde_json::to_string(&snapshot.items).or_raise(|| ErrorKind::InvalidData("items"))?;
        sqlx::query(include_str!("../../queries/upsert_snapshot.sql"))
            .bind(key)
            .bind(items)
            .bind(snapshot.timestamp)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM snapshots WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    fn keys<'a>(&'a self) -> KeyStream<'a> {
        Box::pin(stream! {
            let mut rows = sqlx::query_scalar::<_, String>("SELECT key FROM snapshots").fetch(&self.pool);
            loop {
                match rows.try_next().await {
                    Ok(Some(key)) => yield Ok(key),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(exn::Exn::from(ErrorKind::BackendError(e.to_string())));
                        break;
                    },
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let store = SqliteStore::connect_in_memory("sqlite").await.unwrap();
        let snapshot = Snapshot::new(vec![Item::open(1, "one"), Item::open(2, "two")], 99);
        store.write("ns:o/r", &snapshot).await.unwrap();
        assert_eq!(store.read("ns:o/r").await.unwrap(), Some(snapshot));
        assert_eq!(store.read("ns:o/missing").await.unwrap(), None);
        store.close().await;
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = SqliteStore::connect_in_memory("sqlite").await.unwrap();
        store.write("ns:o/r", &Snapshot::new(vec![Item::open(1, "one")], 1)).await.unwrap();
        store.write("ns:o/r", &Snapshot::new(vec![], 2)).await.unwrap();
        assert_eq!(store.read("ns:o/r").await.unwrap(), Some(Snapshot::new(vec![], 2)));
        assert_eq!(store.list_keys().await.unwrap(), ["ns:o/r"]);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SqliteStore::connect_in_memory("sqlite").await.unwrap();
        store.write("ns:o/r", &Snapshot::new(vec![], 1)).await.unwrap();
        store.remove("ns:o/r").await.unwrap();
        store.remove("ns:o/r").await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let store = SqliteStore::connect_in_memory("sqlite").await.unwrap();
        store.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/snapshots.db");
        let store = SqliteStore::connect("sqlite", &path).await.unwrap();
        store.write("ns:o/r", &Snapshot::new(vec![Item::open(3, "three")], 7)).await.unwrap();
        store.close().await;
        let store = SqliteStore::connect("sqlite", &path).await.unwrap();
        let snapshot = store.read("ns:o/r").await.unwrap().unwrap();
        assert_eq!(snapshot.items[0].number, 3);
        assert_eq!(snapshot.timestamp, 7);
        store.close().await;
    }
}
