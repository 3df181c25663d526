//! Error types for the courierdb core.

use crate::era::Era;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in courierdb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error from the backing medium.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The persisted engine state exists but does not parse.
    ///
    /// Distinct from the "no record yet" case, which yields defaults.
    #[error("persisted state corrupted: {message}")]
    StateCorrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A chunk file exists but does not parse.
    #[error("chunk corrupted: {message}")]
    ChunkCorrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A message position outside the cached range was requested.
    #[error("no message at position {position} (cache holds {size})")]
    MessageNotFound {
        /// The requested position.
        position: usize,
        /// Number of messages available.
        size: usize,
    },

    /// Attempt to reattribute an owned store to a different concrete owner.
    #[error("store is owned by {current}, cannot attribute to {requested}")]
    OwnershipConflict {
        /// The owner recorded in the store.
        current: String,
        /// The conflicting owner that was supplied.
        requested: String,
    },

    /// A mutating operation was called on a read-only chunk storage.
    #[error("chunk storage is read-only")]
    StorageReadOnly,

    /// Another process holds the store root lock.
    #[error("store root locked: another process has exclusive access")]
    StoreLocked,

    /// Era retirement removed some chunks but failed on others.
    ///
    /// Deletion is best-effort: remaining chunks were still attempted after
    /// the first failure.
    #[error("dropping chunks of era {era} left {failed} entries behind: {detail}")]
    DropIncomplete {
        /// The era being retired.
        era: Era,
        /// Number of entries that could not be removed.
        failed: usize,
        /// First underlying failure.
        detail: String,
    },
}

impl CoreError {
    /// Creates a state corruption error.
    pub fn state_corrupted(message: impl Into<String>) -> Self {
        Self::StateCorrupted {
            message: message.into(),
        }
    }

    /// Creates a chunk corruption error.
    pub fn chunk_corrupted(message: impl Into<String>) -> Self {
        Self::ChunkCorrupted {
            message: message.into(),
        }
    }

    /// Returns true for the not-found family of errors.
    ///
    /// Callers may treat these as "no more data" rather than a fault.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::MessageNotFound { .. })
    }
}
