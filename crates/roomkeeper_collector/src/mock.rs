//! Scriptable feed connector for tests and simulations.

use crate::error::{FeedError, FeedResult};
use crate::feed::{Dispatch, FeedClient, FeedConnector, FeedEvent, FeedHandler};
use async_trait::async_trait;
use parking_lot::Mutex;
use roomkeeper_core::RoomId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One connection handed out by a [`MockFeedConnector`].
pub struct MockConnection {
    room_id: RoomId,
    handler: Arc<dyn FeedHandler>,
    close_delay: Option<Duration>,
    closes: AtomicUsize,
}

impl MockConnection {
    /// Room the connection was dialed for.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Delivers an inbound event to the session.
    pub fn deliver(&self, event: FeedEvent) -> Dispatch {
        self.handler.on_event(event)
    }

    /// Simulates a lost connection.
    pub fn disconnect(&self, error: FeedError) {
        self.handler.on_disconnect(error);
    }

    /// Number of completed `close` calls.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Returns true once closed.
    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

struct MockClient(Arc<MockConnection>);

impl FeedClient for MockClient {
    fn close(&self) {
        if let Some(delay) = self.0.close_delay {
            std::thread::sleep(delay);
        }
        self.0.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockState {
    fail_next: usize,
    dial_delay: Option<Duration>,
    close_delay: Option<Duration>,
    dial_times: HashMap<RoomId, Vec<Instant>>,
    connections: HashMap<RoomId, Vec<Arc<MockConnection>>>,
}

/// Feed connector that records dials and lets tests drive connections.
#[derive(Default)]
pub struct MockFeedConnector {
    state: Mutex<MockState>,
}

impl MockFeedConnector {
    /// Creates a connector whose dials succeed immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` dials fail.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().fail_next = count;
    }

    /// Delays every subsequent dial.
    pub fn set_dial_delay(&self, delay: Duration) {
        self.state.lock().dial_delay = Some(delay);
    }

    /// Makes `close` block for `delay` on connections dialed from now on.
    pub fn set_close_delay(&self, delay: Duration) {
        self.state.lock().close_delay = Some(delay);
    }

    /// Number of dials started for `room_id`.
    pub fn dial_count(&self, room_id: RoomId) -> usize {
        self.state
            .lock()
            .dial_times
            .get(&room_id)
            .map_or(0, Vec::len)
    }

    /// Times at which dials for `room_id` started.
    pub fn dial_times(&self, room_id: RoomId) -> Vec<Instant> {
        self.state
            .lock()
            .dial_times
            .get(&room_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every successful connection for `room_id`, oldest first.
    pub fn connections(&self, room_id: RoomId) -> Vec<Arc<MockConnection>> {
        self.state
            .lock()
            .connections
            .get(&room_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Most recent successful connection for `room_id`.
    pub fn latest(&self, room_id: RoomId) -> Option<Arc<MockConnection>> {
        self.state
            .lock()
            .connections
            .get(&room_id)
            .and_then(|list| list.last().cloned())
    }

    /// Number of connections not yet closed, across all rooms.
    pub fn open_connections(&self) -> usize {
        self.state
            .lock()
            .connections
            .values()
            .flatten()
            .filter(|connection| !connection.is_closed())
            .count()
    }
}

#[async_trait]
impl FeedConnector for MockFeedConnector {
    async fn dial(
        &self,
        room_id: RoomId,
        handler: Arc<dyn FeedHandler>,
    ) -> FeedResult<Box<dyn FeedClient>> {
        let (fail, delay, close_delay) = {
            let mut state = self.state.lock();
            state
                .dial_times
                .entry(room_id)
                .or_default()
                .push(Instant::now());
            let fail = state.fail_next > 0;
            if fail {
                state.fail_next -= 1;
            }
            (fail, state.dial_delay, state.close_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(FeedError::Dial(format!("room {room_id} unreachable")));
        }

        let connection = Arc::new(MockConnection {
            room_id,
            handler,
            close_delay,
            closes: AtomicUsize::new(0),
        });
        self.state
            .lock()
            .connections
            .entry(room_id)
            .or_default()
            .push(Arc::clone(&connection));
        Ok(Box::new(MockClient(connection)))
    }
}
