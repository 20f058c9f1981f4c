//! Supervisor keeping one feed session per tracked room.

use crate::config::CollectorConfig;
use crate::error::{CollectorError, CollectorResult};
use crate::feed::FeedConnector;
use crate::session::{RoomSession, SessionState};
use crate::sink::EventSink;
use parking_lot::Mutex;
use roomkeeper_bridge::Receiver;
use roomkeeper_core::{RoomId, RoomSet};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Receiver that maintains one [`RoomSession`] per tracked room.
///
/// Sessions run on the runtime the collector was created on, so bridge
/// callbacks may arrive from any thread.
pub struct Collector {
    connector: Arc<dyn FeedConnector>,
    sink: Arc<dyn EventSink>,
    config: CollectorConfig,
    runtime: Handle,
    stopped: AtomicBool,
    sessions: Mutex<HashMap<RoomId, RoomSession>>,
}

impl Collector {
    /// Creates a collector bound to the current tokio runtime.
    pub fn new(
        connector: Arc<dyn FeedConnector>,
        sink: Arc<dyn EventSink>,
        config: CollectorConfig,
    ) -> CollectorResult<Self> {
        let runtime = Handle::try_current().map_err(|_| CollectorError::NoRuntime)?;
        Ok(Self::with_runtime(connector, sink, config, runtime))
    }

    /// Creates a collector whose sessions run on `runtime`.
    pub fn with_runtime(
        connector: Arc<dyn FeedConnector>,
        sink: Arc<dyn EventSink>,
        config: CollectorConfig,
        runtime: Handle,
    ) -> Self {
        Self {
            connector,
            sink,
            config,
            runtime,
            stopped: AtomicBool::new(false),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn drain(&self) -> Vec<RoomSession> {
        self.stopped.store(true, Ordering::SeqCst);
        let sessions: Vec<RoomSession> = {
            let mut map = self.sessions.lock();
            map.drain().map(|(_, session)| session).collect()
        };
        if !sessions.is_empty() {
            info!("stopping {} feed sessions", sessions.len());
        }
        sessions
    }

    /// Stops every session. Later membership callbacks are ignored.
    ///
    /// Connections are closed on the calling thread, so this returns once
    /// every feed is closed.
    pub fn stop(&self) {
        for session in self.drain() {
            session.stop();
        }
    }

    /// Number of live sessions.
    pub fn room_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Rooms with a live session.
    pub fn rooms(&self) -> RoomSet {
        self.sessions.lock().keys().copied().collect()
    }

    /// Connection state of the session for `room_id`, if any.
    pub fn session_state(&self, room_id: RoomId) -> Option<SessionState> {
        self.sessions.lock().get(&room_id).map(RoomSession::state)
    }
}

impl Receiver for Collector {
    fn on_add_room(&self, room_id: RoomId) {
        if self.is_stopped() {
            return;
        }

        let mut sessions = self.sessions.lock();
        if self.is_stopped() || sessions.contains_key(&room_id) {
            return;
        }

        let session = RoomSession::new(
            room_id,
            Arc::clone(&self.connector),
            Arc::clone(&self.sink),
            &self.config,
        );
        session.start_on(&self.runtime);
        sessions.insert(room_id, session);
        debug!(%room_id, "session registered");
    }

    fn on_del_room(&self, room_id: RoomId) {
        if self.is_stopped() {
            return;
        }

        // Stopped under the map lock so a re-add cannot race the old
        // session; the feed close runs on the blocking pool.
        let mut sessions = self.sessions.lock();
        if self.is_stopped() {
            return;
        }
        if let Some(session) = sessions.remove(&room_id) {
            session.stop_on(&self.runtime);
            debug!(%room_id, "session removed");
        }
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        // May run inside a bridge callback when the receiver is replaced.
        for session in self.drain() {
            session.stop_on(&self.runtime);
        }
    }
}
