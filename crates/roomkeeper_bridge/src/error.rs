//! Error types for room-set replication.

use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Result type for coordination store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The coordination store rejected or failed a write.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// `start` was called outside of a tokio runtime.
    #[error("no async runtime available to run the membership watch")]
    NoRuntime,
}

/// Errors raised by a coordination store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store canceled an open watch.
    #[error("watch canceled: {0}")]
    WatchCanceled(String),

    /// The watch stream ended without an error.
    #[error("watch stream closed")]
    WatchClosed,

    /// The requested revision is no longer retained.
    #[error("revision {requested} compacted, oldest retained is {oldest}")]
    Compacted {
        /// Revision the watch asked to resume from.
        requested: u64,
        /// Oldest revision still available.
        oldest: u64,
    },
}

impl StoreError {
    /// Returns true if re-establishing the watch may succeed.
    ///
    /// Every store error is transient from the watcher's point of view;
    /// a compacted revision is recovered by a full resynchronization.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Unavailable(_)
            | StoreError::WatchCanceled(_)
            | StoreError::WatchClosed
            | StoreError::Compacted { .. } => true,
        }
    }
}
