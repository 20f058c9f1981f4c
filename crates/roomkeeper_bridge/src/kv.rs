//! Bridge backed by a shared coordination store.
//!
//! Every tracked room is a marker key `<prefix><decimal id>`. Publishers
//! write and delete marker keys; each process runs one watch task that
//! mirrors the keys into a live room set and forwards changes to the
//! attached receiver.
//!
//! # Resynchronization
//!
//! When the watch is (re-)established the watcher replays the whole
//! prefix inside a reset window. On reset-begin the live set is moved
//! into a shadow set and rebuilt from the replay without notifying the
//! receiver. On reset-end the receiver gets the net delta between the
//! shadow and the rebuilt set, deletions first. A room removed and
//! re-added inside one window produces no callback at all.
//!
//! A receiver attached during a window is replayed the full live set at
//! reset-end instead of the delta, since it never saw the shadow set.

use crate::bridge::{Bridge, Publisher, Receiver};
use crate::error::{BridgeError, BridgeResult};
use crate::store::KvStore;
use crate::watcher::{WatchHandler, Watcher};
use async_trait::async_trait;
use parking_lot::Mutex;
use roomkeeper_core::{RoomDelta, RoomId, RoomSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Value stored under every marker key.
const MARKER: &[u8] = b"-";

/// Builds the marker key for a room.
pub fn room_key(prefix: &str, room_id: RoomId) -> String {
    format!("{prefix}{room_id}")
}

/// Extracts the room from a marker key.
///
/// Returns `None` for keys outside the prefix or with a suffix that is
/// not a canonical decimal room ID.
pub fn parse_room_key(prefix: &str, key: &str) -> Option<RoomId> {
    key.strip_prefix(prefix)?.parse().ok()
}

/// Configuration for a [`KvBridge`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Prefix of marker keys.
    pub key_prefix: String,
    /// Pause before re-establishing a failed watch.
    pub watch_retry_delay: Duration,
}

impl BridgeConfig {
    /// Creates a configuration with the given key prefix.
    pub fn new(key_prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: key_prefix.into(),
            watch_retry_delay: Duration::from_secs(1),
        }
    }

    /// Sets the pause before re-establishing a failed watch.
    pub fn with_watch_retry_delay(mut self, delay: Duration) -> Self {
        self.watch_retry_delay = delay;
        self
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new("room_")
    }
}

#[derive(Default)]
struct MembershipState {
    rooms: RoomSet,
    shadow: RoomSet,
    receiver: Option<Arc<dyn Receiver>>,
    in_reset: bool,
    receiver_changed: bool,
}

struct Shared {
    key_prefix: String,
    state: Mutex<MembershipState>,
    stopped: AtomicBool,
}

impl Shared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn decode(&self, key: &str) -> Option<RoomId> {
        let room_id = parse_room_key(&self.key_prefix, key);
        if room_id.is_none() {
            debug!("ignoring malformed membership key {:?}", key);
        }
        room_id
    }
}

impl WatchHandler for Shared {
    fn on_reset_begin(&self) {
        let mut state = self.state.lock();
        if state.in_reset {
            // The shadow already holds the pre-window set.
            state.rooms.clear();
        } else {
            state.in_reset = true;
            state.shadow = std::mem::take(&mut state.rooms);
        }
    }

    fn on_put(&self, key: &str, _value: &[u8]) {
        let Some(room_id) = self.decode(key) else {
            return;
        };

        let mut state = self.state.lock();
        if state.rooms.insert(room_id) && !state.in_reset {
            if let Some(receiver) = &state.receiver {
                receiver.on_add_room(room_id);
            }
        }
    }

    fn on_delete(&self, key: &str) {
        let Some(room_id) = self.decode(key) else {
            return;
        };

        let mut state = self.state.lock();
        if state.rooms.remove(&room_id) && !state.in_reset {
            if let Some(receiver) = &state.receiver {
                receiver.on_del_room(room_id);
            }
        }
    }

    fn on_reset_end(&self) {
        let mut state = self.state.lock();
        state.in_reset = false;
        let shadow = std::mem::take(&mut state.shadow);

        if state.receiver_changed {
            state.receiver_changed = false;
            if let Some(receiver) = &state.receiver {
                debug!("replaying {} rooms to new receiver", state.rooms.len());
                for room_id in &state.rooms {
                    receiver.on_add_room(*room_id);
                }
            }
            return;
        }

        let delta = RoomDelta::between(&shadow, &state.rooms);
        if delta.is_empty() {
            return;
        }
        info!(
            "membership resynchronized: {} removed, {} added",
            delta.removed.len(),
            delta.added.len()
        );
        if let Some(receiver) = &state.receiver {
            for room_id in &delta.removed {
                receiver.on_del_room(*room_id);
            }
            for room_id in &delta.added {
                receiver.on_add_room(*room_id);
            }
        }
    }
}

/// Bridge that replicates the room set through a [`KvStore`].
pub struct KvBridge {
    store: Arc<dyn KvStore>,
    config: BridgeConfig,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl KvBridge {
    /// Creates a bridge over `store`. The watch starts with [`Bridge::start`].
    pub fn new(store: Arc<dyn KvStore>, config: BridgeConfig) -> Self {
        let shared = Arc::new(Shared {
            key_prefix: config.key_prefix.clone(),
            state: Mutex::new(MembershipState::default()),
            stopped: AtomicBool::new(false),
        });

        Self {
            store,
            config,
            shared,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Returns the bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns true once [`Bridge::stop`] was called.
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Returns true while a resynchronization window is open.
    pub fn in_reset(&self) -> bool {
        self.shared.state.lock().in_reset
    }

    fn key(&self, room_id: RoomId) -> String {
        room_key(&self.config.key_prefix, room_id)
    }
}

async fn watch_loop(
    watcher: Watcher,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    retry_delay: Duration,
) {
    loop {
        match watcher.run(shared.as_ref(), &cancel).await {
            Ok(()) => break,
            Err(err) => {
                if shared.is_stopped() {
                    debug!("membership watch ended after stop: {}", err);
                    break;
                }
                error!(
                    "membership watch on {:?} failed: {}, reconnecting",
                    watcher.prefix(),
                    err
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        }
    }
    debug!("membership watch on {:?} exited", watcher.prefix());
}

#[async_trait]
impl Publisher for KvBridge {
    async fn add_room(&self, room_id: RoomId) -> BridgeResult<()> {
        self.store.put(&self.key(room_id), MARKER).await?;
        debug!(%room_id, "membership key written");
        Ok(())
    }

    async fn del_room(&self, room_id: RoomId) -> BridgeResult<()> {
        self.store.delete(&self.key(room_id)).await?;
        debug!(%room_id, "membership key deleted");
        Ok(())
    }
}

impl Bridge for KvBridge {
    fn set_receiver(&self, receiver: Arc<dyn Receiver>) {
        let mut state = self.shared.state.lock();
        if state.in_reset {
            state.receiver_changed = true;
        } else {
            for room_id in &state.rooms {
                receiver.on_add_room(*room_id);
            }
        }
        state.receiver = Some(receiver);
    }

    fn start(&self) -> BridgeResult<()> {
        let mut task = self.task.lock();
        if task.is_some() || self.is_stopped() {
            return Ok(());
        }

        let handle = tokio::runtime::Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
        let watcher = Watcher::new(Arc::clone(&self.store), self.config.key_prefix.clone());
        info!("watching membership keys under {:?}", self.config.key_prefix);
        *task = Some(handle.spawn(watch_loop(
            watcher,
            Arc::clone(&self.shared),
            self.cancel.clone(),
            self.config.watch_retry_delay,
        )));
        Ok(())
    }

    fn stop(&self) -> BridgeResult<()> {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cancel.cancel();
        self.task.lock().take();
        info!("membership bridge stopped");
        Ok(())
    }

    fn rooms(&self) -> RoomSet {
        self.shared.state.lock().rooms.clone()
    }
}

impl Drop for KvBridge {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
