//! Coordination store abstraction.
//!
//! The distributed bridge needs a consistent key-value store with
//! revisioned prefix ranges and prefix watches that can resume from a
//! revision. This trait keeps the bridge independent of the concrete
//! client (etcd, or the in-memory store used in tests and simulations).

use crate::error::StoreResult;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A change observed on a watched prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvEvent {
    /// A key was created or overwritten.
    Put {
        /// Full key.
        key: String,
        /// New value.
        value: Vec<u8>,
        /// Store revision of the change.
        revision: u64,
    },
    /// A key was deleted.
    Delete {
        /// Full key.
        key: String,
        /// Store revision of the change.
        revision: u64,
    },
}

impl KvEvent {
    /// Returns the key this event refers to.
    pub fn key(&self) -> &str {
        match self {
            KvEvent::Put { key, .. } | KvEvent::Delete { key, .. } => key,
        }
    }

    /// Returns the revision of this event.
    pub fn revision(&self) -> u64 {
        match self {
            KvEvent::Put { revision, .. } | KvEvent::Delete { revision, .. } => *revision,
        }
    }
}

/// Consistent view of a prefix at one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Key/value pairs under the prefix, ordered by key.
    pub entries: Vec<(String, Vec<u8>)>,
    /// Store revision the snapshot was taken at.
    pub revision: u64,
}

/// Stream of watch events.
///
/// An `Err` item terminates the watch; the stream yields `None`
/// afterwards.
pub struct WatchStream {
    rx: mpsc::UnboundedReceiver<StoreResult<KvEvent>>,
    failed: bool,
}

impl WatchStream {
    /// Wraps a channel fed by a store implementation.
    pub fn new(rx: mpsc::UnboundedReceiver<StoreResult<KvEvent>>) -> Self {
        Self { rx, failed: false }
    }

    /// Receives the next event.
    ///
    /// Returns `None` once the store side hangs up or after an error.
    pub async fn recv(&mut self) -> Option<StoreResult<KvEvent>> {
        if self.failed {
            return None;
        }
        let item = self.rx.recv().await;
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

impl std::fmt::Debug for WatchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStream")
            .field("failed", &self.failed)
            .finish()
    }
}

/// A consistent key-value store with prefix watches.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Creates or overwrites a key.
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Deletes a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Reads every key under `prefix` at a single revision.
    async fn range(&self, prefix: &str) -> StoreResult<Snapshot>;

    /// Watches `prefix` for changes with revision `>= from_revision`.
    ///
    /// Fails with `StoreError::Compacted` if that revision is no longer
    /// retained.
    async fn watch(&self, prefix: &str, from_revision: u64) -> StoreResult<WatchStream>;
}
