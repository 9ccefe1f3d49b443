//! Pull request models and the board they are sorted into.
//!
//! A [`CollectionKey`] names one repository; the [`Item`]s fetched for it are
//! sorted into a fixed, ordered set of [`Bucket`]s by [`classify`]. The
//! classifier is pure: no clocks, no I/O. Give it the same attributes and it
//! gives back the same bucket.

mod classify;
pub mod error;
pub mod models;

pub use crate::classify::{build_buckets, classify};
pub use crate::models::{Bucket, BucketId, CheckStatus, CollectionKey, Item, ItemState, Mergeable, ReviewDecision};
