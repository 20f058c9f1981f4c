//! A receiver that records every callback, for tests and diagnostics.

use crate::bridge::Receiver;
use parking_lot::Mutex;
use roomkeeper_core::{RoomId, RoomSet};

/// A single receiver callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// `on_add_room` was called.
    Added(RoomId),
    /// `on_del_room` was called.
    Removed(RoomId),
}

/// Receiver that keeps the ordered list of callbacks it observed.
#[derive(Debug, Default)]
pub struct RecordingReceiver {
    events: Mutex<Vec<RoomEvent>>,
}

impl RecordingReceiver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All callbacks observed so far, in order.
    pub fn events(&self) -> Vec<RoomEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns the recorded callbacks.
    pub fn take_events(&self) -> Vec<RoomEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Replays the recorded callbacks onto an empty set.
    pub fn replayed_rooms(&self) -> RoomSet {
        let mut rooms = RoomSet::new();
        for event in self.events.lock().iter() {
            match event {
                RoomEvent::Added(id) => {
                    rooms.insert(*id);
                }
                RoomEvent::Removed(id) => {
                    rooms.remove(id);
                }
            }
        }
        rooms
    }

    /// Number of recorded callbacks.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Receiver for RecordingReceiver {
    fn on_add_room(&self, room_id: RoomId) {
        self.events.lock().push(RoomEvent::Added(room_id));
    }

    fn on_del_room(&self, room_id: RoomId) {
        self.events.lock().push(RoomEvent::Removed(room_id));
    }
}
