//! Sorting pull requests into board buckets.
//!
//! Predicates are evaluated top to bottom and the first match wins. Changing
//! the order of [`RULES`] changes which bucket an item lands in, so treat any
//! reordering as a breaking change for every consumer of the board.

use crate::models::{Bucket, BucketId, CheckStatus, Item, ItemState, Mergeable, ReviewDecision};

type Predicate = fn(&Item) -> bool;

/// Precedence-ordered classification rules. An item matching none of them is
/// [`BucketId::Pending`].
const RULES: &[(Predicate, BucketId)] = &[
    (|item: &Item| item.state == ItemState::Merged, BucketId::Merged),
    (|item: &Item| item.state == ItemState::Closed, BucketId::Closed),
    (|item: &Item| item.is_draft, BucketId::Draft),
    (|item: &Item| item.mergeable == Mergeable::Conflicting, BucketId::Conflicts),
    (|item: &Item| item.checks == CheckStatus::Failing, BucketId::ChecksFailing),
    (|item: &Item| item.review_decision == ReviewDecision::ChangesRequested, BucketId::ChangesRequested),
    (
        |item: &Item| item.review_decision == ReviewDecision::Approved && item.checks == CheckStatus::Passing,
        BucketId::ReadyToMerge,
    ),
    (|item: &Item| item.review_decision == ReviewDecision::ReviewRequired, BucketId::ReviewRequired),
];

/// Returns the bucket a single item belongs in.
///
/// # Examples
///
/// ```
/// use prsync_board::{BucketId, Item, ItemState, classify};
///
/// let mut item = Item::open(1, "Add feature");
/// assert_eq!(classify(&item), BucketId::Pending);
/// item.is_draft = true;
/// assert_eq!(classify(&item), BucketId::Draft);
/// // Merged beats everything else.
/// item.state = ItemState::Merged;
/// assert_eq!(classify(&item), BucketId::Merged);
/// ```
pub fn classify(item: &Item) -> BucketId {
    RULES
        .iter()
        .find(|(matches, _)| matches(item))
        .map(|(_, bucket)| *bucket)
        .unwrap_or(BucketId::Pending)
}

/// Group items into the full, ordered board.
///
/// Every bucket in [`BucketId::ALL`] is present in display order, even if
/// empty. Items keep their relative input order within a bucket.
pub fn build_buckets(items: &[Item]) -> Vec<Bucket> {
    let mut buckets = Bucket::empty_set();
    for item in items {
        let id = classify(item);
        // Infallible: empty_set() yields every id in BucketId::ALL.
        if let Some(bucket) = buckets.iter_mut().find(|b| b.id == id) {
            bucket.items.push(item.clone());
        }
    }
    tracing::trace!(items = items.len(), "Classified items into board buckets");
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn item(
        state: ItemState,
        is_draft: bool,
        mergeable: Mergeable,
        checks: CheckStatus,
        review: ReviewDecision,
    ) -> Item {
        Item {
            state,
            is_draft,
            mergeable,
            checks,
            review_decision: review,
            ..Item::open(1, "test")
        }
    }

    use CheckStatus as C;
    use ItemState as S;
    use Mergeable as M;
    use ReviewDecision as R;

    #[rstest]
    // Merged beats draft, conflicts, failing checks.
    #[case(S::Merged, true, M::Conflicting, C::Failing, R::ChangesRequested, BucketId::Merged)]
    #[case(S::Closed, true, M::Conflicting, C::Failing, R::Approved, BucketId::Closed)]
    // Draft beats conflicts.
    #[case(S::Open, true, M::Conflicting, C::Failing, R::Approved, BucketId::Draft)]
    // Conflicts beat failing checks.
    #[case(S::Open, false, M::Conflicting, C::Failing, R::Approved, BucketId::Conflicts)]
    // Failing checks beat changes requested.
    #[case(S::Open, false, M::Mergeable, C::Failing, R::ChangesRequested, BucketId::ChecksFailing)]
    #[case(S::Open, false, M::Mergeable, C::Passing, R::ChangesRequested, BucketId::ChangesRequested)]
    #[case(S::Open, false, M::Mergeable, C::Passing, R::Approved, BucketId::ReadyToMerge)]
    // Approved but checks still running is not ready.
    #[case(S::Open, false, M::Mergeable, C::Pending, R::Approved, BucketId::Pending)]
    #[case(S::Open, false, M::Unknown, C::None, R::Approved, BucketId::Pending)]
    #[case(S::Open, false, M::Mergeable, C::Passing, R::ReviewRequired, BucketId::ReviewRequired)]
    #[case(S::Open, false, M::Unknown, C::Pending, R::ReviewRequired, BucketId::ReviewRequired)]
    #[case(S::Open, false, M::Unknown, C::None, R::None, BucketId::Pending)]
    fn test_classify(
        #[case] state: ItemState,
        #[case] is_draft: bool,
        #[case] mergeable: Mergeable,
        #[case] checks: CheckStatus,
        #[case] review: ReviewDecision,
        #[case] expected: BucketId,
    ) {
        assert_eq!(classify(&item(state, is_draft, mergeable, checks, review)), expected);
    }

    #[test]
    fn test_classify_ignores_non_classification_attributes() {
        let a = Item { title: "one".into(), author: "alice".into(), ..item(S::Open, true, M::Unknown, C::None, R::None) };
        let b = Item { number: 99, url: "https://x".into(), ..item(S::Open, true, M::Unknown, C::None, R::None) };
        assert_eq!(classify(&a), classify(&b));
    }

    #[test]
    fn test_build_buckets_empty_input_has_every_bucket() {
        let buckets = build_buckets(&[]);
        let ids: Vec<_> = buckets.iter().map(|b| b.id).collect();
        assert_eq!(ids, BucketId::ALL);
        assert!(buckets.iter().all(Bucket::is_empty));
    }

    #[test]
    fn test_build_buckets_preserves_input_order() {
        let items = vec![
            Item::open(3, "c"),
            Item { is_draft: true, ..Item::open(1, "draft") },
            Item::open(1, "a"),
            Item::open(2, "b"),
        ];
        let buckets = build_buckets(&items);
        let ids: Vec<_> = buckets.iter().map(|b| b.id).collect();
        assert_eq!(ids, BucketId::ALL);
        let pending = buckets.iter().find(|b| b.id == BucketId::Pending).unwrap();
        let titles: Vec<_> = pending.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["c", "a", "b"]);
        let total: usize = buckets.iter().map(Bucket::len).sum();
        assert_eq!(total, items.len());
    }
}
