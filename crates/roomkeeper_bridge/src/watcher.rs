//! Resynchronizing prefix watcher.
//!
//! A watch session starts by reading the whole prefix and replaying it
//! between a reset-begin and a reset-end signal, then follows live changes
//! from the snapshot revision onwards. A handler that rebuilds its state
//! inside the reset window therefore never misses a change, even when the
//! watch had to be re-established after a connection loss.

use crate::error::{StoreError, StoreResult};
use crate::store::{KvEvent, KvStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Callbacks driven by a [`Watcher`].
pub trait WatchHandler: Send + Sync {
    /// A full replay of the prefix is about to start.
    fn on_reset_begin(&self);

    /// A key under the prefix exists or was written.
    fn on_put(&self, key: &str, value: &[u8]);

    /// A key under the prefix was deleted.
    fn on_delete(&self, key: &str);

    /// The replay started by `on_reset_begin` is complete.
    fn on_reset_end(&self);
}

/// Watches one prefix of a [`KvStore`].
pub struct Watcher {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl Watcher {
    /// Creates a watcher for `prefix`.
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Returns the watched prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Runs one watch session.
    ///
    /// Returns `Ok(())` when `cancel` fires and the first store error
    /// otherwise. A stream that ends without an error is reported as
    /// [`StoreError::WatchClosed`].
    pub async fn run(
        &self,
        handler: &dyn WatchHandler,
        cancel: &CancellationToken,
    ) -> StoreResult<()> {
        let snapshot = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            snapshot = self.store.range(&self.prefix) => snapshot?,
        };

        debug!(
            "replaying {} keys under {:?} at revision {}",
            snapshot.entries.len(),
            self.prefix,
            snapshot.revision
        );
        handler.on_reset_begin();
        for (key, value) in &snapshot.entries {
            handler.on_put(key, value);
        }
        handler.on_reset_end();

        let mut stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            stream = self.store.watch(&self.prefix, snapshot.revision + 1) => stream?,
        };

        loop {
            let item = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                item = stream.recv() => item,
            };

            match item {
                Some(Ok(KvEvent::Put { key, value, .. })) => handler.on_put(&key, &value),
                Some(Ok(KvEvent::Delete { key, .. })) => handler.on_delete(&key),
                Some(Err(err)) => return Err(err),
                None => return Err(StoreError::WatchClosed),
            }
        }
    }
}
