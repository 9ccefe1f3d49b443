//! Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only construction can fail outright. Fetch failures are raised by a
//! [`CollectionFetcher`](crate::CollectionFetcher) but never escape the
//! [`Synchronizer`](crate::Synchronizer): they end up as data on the entry.

use derive_more::{Display, Error};
use std::time::Duration;

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The freshness/staleness windows are inconsistent.
    #[display("invalid cache policy: {_0}")]
    InvalidPolicy(#[error(not(source))] &'static str),
    /// The remote collection could not be fetched. The message is meant to be
    /// shown to a human as-is.
    #[display("{_0}")]
    Fetch(#[error(not(source))] String),
    /// The remote did not answer within the configured fetch timeout.
    #[display("request timed out after {}s", _0.as_secs())]
    Timeout(#[error(not(source))] Duration),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Timeout(_))
    }
}
