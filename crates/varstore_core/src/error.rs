//! Error types for VarStore core.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in VarStore core operations.
///
/// Lookup misses are not errors; see [`crate::Lookup`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// Document store error.
    #[error("storage error: {0}")]
    Storage(#[from] varstore_storage::StorageError),

    /// Value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] varstore_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The configuration is invalid. Fatal at startup.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// A store operation did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The configured limit.
        after: Duration,
    },

    /// Migration could not start or a legacy file is unusable.
    #[error("migration failed: {message}")]
    Migration {
        /// Description of the failure.
        message: String,
    },

    /// The operation was cancelled by shutdown.
    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a migration error.
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    /// Returns true if the store could not be reached or did not answer.
    ///
    /// Retry policy belongs to the caller; the core never retries.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_connectivity(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Io(io::Error::other(e))
        }
    }
}
