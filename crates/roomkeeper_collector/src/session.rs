//! Per-room feed session.
//!
//! A session owns at most one feed connection. A single task per session
//! dials the feed, waits for the connection to fail, and dials again with
//! exponential backoff until the session is stopped:
//!
//! ```text
//! Idle -> Connecting -> Connected -> Disconnected -> Connecting -> ...
//!   \__________\____________\______________\_____________> Stopped
//! ```
//!
//! `Stopped` is terminal. A dial that completes after `stop` closes the
//! new connection instead of installing it, so a stopped session never
//! holds a live client.

use crate::config::CollectorConfig;
use crate::error::{CollectorError, CollectorResult, FeedError, FeedResult};
use crate::feed::{Dispatch, FeedClient, FeedConnector, FeedEvent, FeedHandler};
use crate::ingest::ingest;
use crate::sink::EventSink;
use parking_lot::Mutex;
use roomkeeper_core::{RetryConfig, RoomId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not started.
    Idle,
    /// Dialing the feed.
    Connecting,
    /// A connection is installed.
    Connected,
    /// The last connection or dial failed; a retry is pending.
    Disconnected,
    /// Stopped for good.
    Stopped,
}

impl SessionState {
    /// Returns true for the terminal state.
    pub fn is_terminal(self) -> bool {
        self == SessionState::Stopped
    }
}

type Disconnect = (u64, FeedError);

struct SessionShared {
    room_id: RoomId,
    connector: Arc<dyn FeedConnector>,
    sink: Arc<dyn EventSink>,
    retry: RetryConfig,
    state: Mutex<SessionState>,
    stopped: AtomicBool,
    cancel: CancellationToken,
    client: Mutex<Option<Box<dyn FeedClient>>>,
    generation: AtomicU64,
    disconnects: mpsc::UnboundedSender<Disconnect>,
}

impl SessionShared {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        if !state.is_terminal() {
            *state = next;
        }
    }

    /// Dials once and installs the connection.
    ///
    /// Succeeds without dialing when already stopped.
    async fn connect(self: &Arc<Self>) -> FeedResult<()> {
        if self.is_stopped() {
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(SessionState::Connecting);
        let handler = Arc::new(ConnectionHandler {
            session: Arc::downgrade(self),
            generation,
        });
        let client = self.connector.dial(self.room_id, handler).await?;

        let replaced = {
            let mut slot = self.client.lock();
            if self.is_stopped() {
                drop(slot);
                debug!(room_id = %self.room_id, "closing connection dialed after stop");
                client.close();
                return Ok(());
            }
            self.set_state(SessionState::Connected);
            slot.replace(client)
        };
        if let Some(old) = replaced {
            old.close();
        }

        info!(room_id = %self.room_id, "connected to live room");
        Ok(())
    }

    /// Dials until a connection is installed. Returns false once stopped.
    async fn connect_with_backoff(self: &Arc<Self>) -> bool {
        let mut backoff = self.retry.backoff();
        loop {
            if self.is_stopped() {
                return false;
            }

            match self.connect().await {
                Ok(()) => return !self.is_stopped(),
                Err(err) => {
                    self.set_state(SessionState::Disconnected);
                    let delay = backoff.next_delay();
                    error!(
                        room_id = %self.room_id,
                        "connect failed: {}, retry after {:?}",
                        err,
                        delay
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return false,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn deliver(&self, event: FeedEvent) -> Dispatch {
        if self.is_stopped() {
            return Dispatch::Close;
        }
        ingest(self.room_id, self.sink.as_ref(), &event);
        Dispatch::Continue
    }
}

/// Handler bound to one connection attempt.
struct ConnectionHandler {
    session: Weak<SessionShared>,
    generation: u64,
}

impl FeedHandler for ConnectionHandler {
    fn on_event(&self, event: FeedEvent) -> Dispatch {
        match self.session.upgrade() {
            Some(session) => session.deliver(event),
            None => Dispatch::Close,
        }
    }

    fn on_disconnect(&self, error: FeedError) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        if session.is_stopped() {
            return;
        }
        let _ = session.disconnects.send((self.generation, error));
    }
}

async fn supervise(session: Arc<SessionShared>, mut disconnects: mpsc::UnboundedReceiver<Disconnect>) {
    info!(room_id = %session.room_id, "connecting to live room");
    loop {
        if !session.connect_with_backoff().await {
            break;
        }

        let error = loop {
            let next = tokio::select! {
                _ = session.cancel.cancelled() => None,
                next = disconnects.recv() => next,
            };
            let Some((generation, error)) = next else {
                return;
            };
            if generation == session.generation.load(Ordering::SeqCst) {
                break error;
            }
            debug!(room_id = %session.room_id, generation, "ignoring stale disconnect");
        };

        if session.is_stopped() {
            break;
        }
        session.set_state(SessionState::Disconnected);
        error!(room_id = %session.room_id, "connection interrupted: {}, reconnecting", error);
    }
    debug!(room_id = %session.room_id, "session task exited");
}

/// Maintains the feed connection of one room.
pub struct RoomSession {
    shared: Arc<SessionShared>,
    disconnects: Mutex<Option<mpsc::UnboundedReceiver<Disconnect>>>,
}

impl RoomSession {
    /// Creates an idle session.
    pub fn new(
        room_id: RoomId,
        connector: Arc<dyn FeedConnector>,
        sink: Arc<dyn EventSink>,
        config: &CollectorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(SessionShared {
            room_id,
            connector,
            sink,
            retry: config.retry.clone(),
            state: Mutex::new(SessionState::Idle),
            stopped: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            client: Mutex::new(None),
            generation: AtomicU64::new(0),
            disconnects: tx,
        });

        Self {
            shared,
            disconnects: Mutex::new(Some(rx)),
        }
    }

    /// Room this session ingests.
    pub fn room_id(&self) -> RoomId {
        self.shared.room_id
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Returns true once [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Returns true while a connection is installed.
    pub fn has_client(&self) -> bool {
        self.shared.client.lock().is_some()
    }

    /// Starts the session on the current tokio runtime.
    pub fn start(&self) -> CollectorResult<()> {
        let runtime = Handle::try_current().map_err(|_| CollectorError::NoRuntime)?;
        self.start_on(&runtime);
        Ok(())
    }

    /// Starts the session task on `runtime`. Starting twice has no effect.
    ///
    /// A failed first dial goes through the same backoff as a later
    /// disconnect.
    pub fn start_on(&self, runtime: &Handle) {
        let Some(disconnects) = self.disconnects.lock().take() else {
            return;
        };
        runtime.spawn(supervise(Arc::clone(&self.shared), disconnects));
    }

    /// Stops the session and closes its connection. Idempotent.
    ///
    /// Returns true for the call that performed the stop. The connection
    /// is closed on the calling thread.
    pub fn stop(&self) -> bool {
        self.stop_with(|client| client.close())
    }

    /// Stops the session like [`stop`](Self::stop) but closes the
    /// connection on the blocking pool of `runtime`.
    ///
    /// The session is stopped when this returns; only the feed I/O is
    /// deferred. Safe to call under locks that guard other rooms.
    pub fn stop_on(&self, runtime: &Handle) -> bool {
        self.stop_with(|client| {
            runtime.spawn_blocking(move || client.close());
        })
    }

    fn stop_with(&self, close: impl FnOnce(Box<dyn FeedClient>)) -> bool {
        if self
            .shared
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        info!(room_id = %self.shared.room_id, "stop monitoring live room");
        self.shared.cancel.cancel();
        *self.shared.state.lock() = SessionState::Stopped;

        let client = self.shared.client.lock().take();
        if let Some(client) = client {
            close(client);
        }
        true
    }
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}
