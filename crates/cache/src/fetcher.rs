use crate::error::Result;
use async_trait::async_trait;
use prsync_board::{CollectionKey, Item};
use std::sync::Arc;

pub type FetcherHandle = Arc<dyn CollectionFetcher + Send + Sync>;

/// The network side of the cache: turns a key into the full, current
/// collection.
///
/// Transport and encoding belong to the implementation. The cache only needs
/// a (possibly empty) list of items on success, and on failure an
/// [`ErrorKind::Fetch`](crate::error::ErrorKind::Fetch) whose message can be
/// shown to a human.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use prsync_board::{CollectionKey, Item};
/// use prsync_cache::{CollectionFetcher, error::{ErrorKind, Result}};
///
/// struct Offline;
///
/// #[async_trait]
/// impl CollectionFetcher for Offline {
///     async fn fetch(&self, _key: &CollectionKey) -> Result<Vec<Item>> {
///         exn::bail!(ErrorKind::Fetch("offline".to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait CollectionFetcher: Send + Sync {
    async fn fetch(&self, key: &CollectionKey) -> Result<Vec<Item>>;
}
