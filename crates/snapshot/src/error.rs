//! Snapshot Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! None of these ever reach a user: the cache treats every snapshot failure
//! as a cache miss and carries on. They exist so the failure can be logged
//! with something more useful than "it broke".

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A snapshot store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for snapshot store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Storage key cannot be mapped to a location inside the store.
    #[display("invalid snapshot key: {_0}")]
    InvalidKey(#[error(not(source))] String),
    /// Access denied (permissions)
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Root is not usable as a snapshot directory.
    #[display("invalid snapshot directory: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// Serialization/deserialization error.
    #[display("invalid snapshot data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Database | Self::BackendError(_))
    }
}
