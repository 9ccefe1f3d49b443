use crate::clock::Millis;
use prsync_board::{Bucket, BucketId};
use serde::Serialize;

/// What readers see for one collection key.
///
/// `buckets` always holds one bucket per [`BucketId::ALL`], in display order,
/// so a renderer never has to special-case a missing column. When `error` is
/// set, the buckets are the canonical empty set: an error is only ever
/// recorded for a key that has no usable data to show instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub buckets: Vec<Bucket>,
    /// Instant of the last successful fetch, or `0` if never fetched.
    pub timestamp: Millis,
    pub error: Option<String>,
}
impl CacheEntry {
    /// The canonical empty entry: every bucket, no items, never fetched.
    pub fn empty() -> Self {
        Self { buckets: Bucket::empty_set(), timestamp: 0, error: None }
    }

    pub fn fetched(buckets: Vec<Bucket>, timestamp: Millis) -> Self {
        Self { buckets, timestamp, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::empty() }
    }

    pub fn bucket(&self, id: BucketId) -> Option<&Bucket> {
        self.buckets.iter().find(|bucket| bucket.id == id)
    }

    /// Total number of items across every bucket.
    pub fn item_count(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }
}
impl Default for CacheEntry {
    fn default() -> Self {
        Self::empty()
    }
}

/// Network activity for one collection key.
///
/// Loading and revalidating are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchState {
    #[default]
    Idle,
    /// Fetching with nothing usable to show in the meantime.
    Loading,
    /// Fetching while the current (stale) data stays visible.
    Revalidating,
}
impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_revalidating(&self) -> bool {
        matches!(self, Self::Revalidating)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_entry_has_every_bucket() {
        let entry = CacheEntry::empty();
        let ids: Vec<_> = entry.buckets.iter().map(|b| b.id).collect();
        assert_eq!(ids, BucketId::ALL);
        assert_eq!(entry.item_count(), 0);
        assert_eq!(entry.timestamp, 0);
        assert_eq!(entry.error, None);
    }

    #[test]
    fn test_failed_entry_is_empty() {
        let entry = CacheEntry::failed("rate limited");
        assert_eq!(entry.error.as_deref(), Some("rate limited"));
        assert_eq!(entry.buckets, Bucket::empty_set());
    }

    #[test]
    fn test_fetch_state_flags_are_exclusive() {
        for state in [FetchState::Idle, FetchState::Loading, FetchState::Revalidating] {
            assert!(!(state.is_loading() && state.is_revalidating()));
        }
        assert!(FetchState::default().is_idle());
    }
}
