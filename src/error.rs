//! CLI Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open snapshot store")]
    Store,
    #[display("not a repository (expected owner/name): {_0}")]
    InvalidRepository(#[error(not(source))] String),
    /// No usable `gh` executable.
    #[display("GitHub CLI not found; install `gh` or set github.executable")]
    GhNotFound,
    /// The board could not be fetched and nothing was cached.
    #[display("{_0}")]
    Fetch(#[error(not(source))] String),
    #[display("could not write output")]
    Output,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}
