//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store cannot be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// Stored data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A namespace or collection name is not acceptable.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The connection URL names a scheme no store implements.
    #[error("unsupported store url: {0}")]
    UnsupportedUrl(String),
}

impl StorageError {
    /// Returns true if the error means the store could not be reached.
    ///
    /// Callers decide whether to retry; the store never does.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, StorageError::Connection(_) | StorageError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(StorageError::Connection("down".into()).is_connectivity());
        assert!(StorageError::Io(io::Error::other("disk")).is_connectivity());
        assert!(!StorageError::InvalidName("$".into()).is_connectivity());
        assert!(!StorageError::Corrupted("bad".into()).is_connectivity());
    }

    #[test]
    fn error_display() {
        let err = StorageError::UnsupportedUrl("mongodb://x".into());
        assert_eq!(err.to_string(), "unsupported store url: mongodb://x");
    }
}
