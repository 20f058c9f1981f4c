//! Publisher, receiver and bridge capabilities.

use crate::error::BridgeResult;
use async_trait::async_trait;
use roomkeeper_core::{RoomId, RoomSet};
use std::sync::Arc;

/// Write side of a bridge, used by whatever owns room membership.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Records that a room must be tracked.
    ///
    /// Returns an error only if the intent could not be recorded.
    async fn add_room(&self, room_id: RoomId) -> BridgeResult<()>;

    /// Records that a room must no longer be tracked.
    async fn del_room(&self, room_id: RoomId) -> BridgeResult<()>;
}

/// Read side of a bridge.
///
/// Callbacks are invoked synchronously while the bridge holds its own
/// lock, so implementations must not call back into the bridge and
/// should not block on I/O.
pub trait Receiver: Send + Sync {
    /// A room entered the tracked set.
    fn on_add_room(&self, room_id: RoomId);

    /// A room left the tracked set.
    fn on_del_room(&self, room_id: RoomId);
}

/// A replicated room set with a single attached receiver.
pub trait Bridge: Publisher {
    /// Attaches a receiver, replacing any previous one.
    ///
    /// The new receiver is told about every room currently known, either
    /// immediately or, during a resynchronization window, when it ends.
    fn set_receiver(&self, receiver: Arc<dyn Receiver>);

    /// Starts background replication, if any.
    fn start(&self) -> BridgeResult<()>;

    /// Stops background replication. Idempotent.
    fn stop(&self) -> BridgeResult<()>;

    /// Snapshot of the rooms this bridge currently believes are tracked.
    fn rooms(&self) -> RoomSet;
}
