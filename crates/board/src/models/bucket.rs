use super::Item;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Stable identifier of a board column.
///
/// The declaration order is the display order; see [`BucketId::ALL`]. The
/// order in which items are *tested* against each bucket is a separate policy
/// that lives in [`classify()`](crate::classify).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketId {
    Draft,
    Pending,
    ReviewRequired,
    ChangesRequested,
    ChecksFailing,
    Conflicts,
    ReadyToMerge,
    Merged,
    Closed,
}
impl BucketId {
    /// Every configured bucket, in display order.
    pub const ALL: [BucketId; 9] = [
        Self::Draft,
        Self::Pending,
        Self::ReviewRequired,
        Self::ChangesRequested,
        Self::ChecksFailing,
        Self::Conflicts,
        Self::ReadyToMerge,
        Self::Merged,
        Self::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::ReviewRequired => "review_required",
            Self::ChangesRequested => "changes_requested",
            Self::ChecksFailing => "checks_failing",
            Self::Conflicts => "conflicts",
            Self::ReadyToMerge => "ready_to_merge",
            Self::Merged => "merged",
            Self::Closed => "closed",
        }
    }

    /// Human-readable column heading.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Pending => "Pending",
            Self::ReviewRequired => "Needs Review",
            Self::ChangesRequested => "Changes Requested",
            Self::ChecksFailing => "Checks Failing",
            Self::Conflicts => "Merge Conflicts",
            Self::ReadyToMerge => "Ready to Merge",
            Self::Merged => "Merged",
            Self::Closed => "Closed",
        }
    }
}
impl Display for BucketId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// A labelled, ordered group of items on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: BucketId,
    pub label: String,
    pub items: Vec<Item>,
}
impl Bucket {
    pub fn empty(id: BucketId) -> Self {
        Self { id, label: id.label().to_string(), items: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The canonical board: one empty bucket per [`BucketId::ALL`], in order.
    pub fn empty_set() -> Vec<Bucket> {
        BucketId::ALL.iter().copied().map(Self::empty).collect()
    }
}
