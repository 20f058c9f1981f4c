//! In-memory coordination store.

use crate::error::{StoreError, StoreResult};
use crate::store::{KvEvent, KvStore, Snapshot, WatchStream};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::mpsc;

struct Watch {
    prefix: String,
    tx: mpsc::UnboundedSender<StoreResult<KvEvent>>,
}

#[derive(Default)]
struct Inner {
    data: BTreeMap<String, Vec<u8>>,
    revision: u64,
    history: VecDeque<KvEvent>,
    compacted_through: u64,
    watches: Vec<Watch>,
    unavailable: bool,
}

impl Inner {
    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable {
            Err(StoreError::Unavailable("store marked unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn publish(&mut self, event: KvEvent, max_history: usize) {
        self.watches.retain(|watch| {
            if watch.tx.is_closed() {
                return false;
            }
            !event.key().starts_with(&watch.prefix) || watch.tx.send(Ok(event.clone())).is_ok()
        });

        self.history.push_back(event);
        while self.history.len() > max_history {
            if let Some(dropped) = self.history.pop_front() {
                self.compacted_through = dropped.revision();
            }
        }
    }
}

/// A consistent, revisioned key-value store held in memory.
///
/// Changes are published to watchers under the same lock that applies
/// them, so a watch opened at `snapshot.revision + 1` observes every
/// change after the snapshot exactly once. A bounded history allows
/// watches to resume from past revisions; older revisions are reported
/// as compacted.
///
/// Failure injection (`set_unavailable`, `break_watches`, `compact`)
/// lets tests exercise watch recovery.
pub struct MemoryKvStore {
    inner: Mutex<Inner>,
    max_history: usize,
}

impl MemoryKvStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a store that retains at most `max_history` past events.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_history,
        }
    }

    /// Makes every subsequent operation fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().unavailable = unavailable;
    }

    /// Terminates every open watch with `WatchCanceled`.
    pub fn break_watches(&self) {
        let mut inner = self.inner.lock();
        for watch in inner.watches.drain(..) {
            let _ = watch
                .tx
                .send(Err(StoreError::WatchCanceled("connection reset".into())));
        }
    }

    /// Drops all retained history.
    pub fn compact(&self) {
        let mut inner = self.inner.lock();
        inner.history.clear();
        inner.compacted_through = inner.revision;
    }

    /// Current store revision.
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    /// Number of open watches.
    pub fn watch_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.watches.retain(|watch| !watch.tx.is_closed());
        inner.watches.len()
    }

    /// All keys currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().data.keys().cloned().collect()
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check_available()?;

        inner.revision += 1;
        let revision = inner.revision;
        inner.data.insert(key.to_string(), value.to_vec());
        inner.publish(
            KvEvent::Put {
                key: key.to_string(),
                value: value.to_vec(),
                revision,
            },
            self.max_history,
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.check_available()?;

        if inner.data.remove(key).is_none() {
            return Ok(());
        }
        inner.revision += 1;
        let revision = inner.revision;
        inner.publish(
            KvEvent::Delete {
                key: key.to_string(),
                revision,
            },
            self.max_history,
        );
        Ok(())
    }

    async fn range(&self, prefix: &str) -> StoreResult<Snapshot> {
        let inner = self.inner.lock();
        inner.check_available()?;

        let entries = inner
            .data
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Snapshot {
            entries,
            revision: inner.revision,
        })
    }

    async fn watch(&self, prefix: &str, from_revision: u64) -> StoreResult<WatchStream> {
        let mut inner = self.inner.lock();
        inner.check_available()?;

        if from_revision <= inner.compacted_through {
            return Err(StoreError::Compacted {
                requested: from_revision,
                oldest: inner.compacted_through + 1,
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for event in inner
            .history
            .iter()
            .filter(|e| e.revision() >= from_revision && e.key().starts_with(prefix))
        {
            let _ = tx.send(Ok(event.clone()));
        }

        inner.watches.push(Watch {
            prefix: prefix.to_string(),
            tx,
        });
        Ok(WatchStream::new(rx))
    }
}
