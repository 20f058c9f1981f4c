//! In-process bridge for co-located publisher and receiver.

use crate::bridge::{Bridge, Publisher, Receiver};
use crate::error::BridgeResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use roomkeeper_core::{RoomId, RoomSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct LocalState {
    rooms: RoomSet,
    receiver: Option<Arc<dyn Receiver>>,
}

/// Bridge that replicates the room set by direct calls.
///
/// Membership changes are applied under a mutex and forwarded to the
/// receiver synchronously, only when a room actually enters or leaves
/// the set. Nothing is persisted and no operation can fail.
#[derive(Default)]
pub struct LocalBridge {
    state: Mutex<LocalState>,
}

impl LocalBridge {
    /// Creates an empty local bridge.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Publisher for LocalBridge {
    async fn add_room(&self, room_id: RoomId) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if state.rooms.insert(room_id) {
            debug!(%room_id, "room added");
            if let Some(receiver) = &state.receiver {
                receiver.on_add_room(room_id);
            }
        }
        Ok(())
    }

    async fn del_room(&self, room_id: RoomId) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if state.rooms.remove(&room_id) {
            debug!(%room_id, "room removed");
            if let Some(receiver) = &state.receiver {
                receiver.on_del_room(room_id);
            }
        }
        Ok(())
    }
}

impl Bridge for LocalBridge {
    fn set_receiver(&self, receiver: Arc<dyn Receiver>) {
        let mut state = self.state.lock();
        for room_id in &state.rooms {
            receiver.on_add_room(*room_id);
        }
        state.receiver = Some(receiver);
    }

    fn start(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn stop(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn rooms(&self) -> RoomSet {
        self.state.lock().rooms.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{RecordingReceiver, RoomEvent};
    use proptest::prelude::*;

    #[tokio::test]
    async fn forwards_only_transitions() {
        let bridge = LocalBridge::new();
        let recorder = Arc::new(RecordingReceiver::new());
        bridge.set_receiver(recorder.clone());

        bridge.add_room(RoomId(1)).await.unwrap();
        bridge.add_room(RoomId(1)).await.unwrap();
        bridge.del_room(RoomId(2)).await.unwrap();
        bridge.del_room(RoomId(1)).await.unwrap();
        bridge.del_room(RoomId(1)).await.unwrap();

        assert_eq!(
            recorder.events(),
            vec![RoomEvent::Added(RoomId(1)), RoomEvent::Removed(RoomId(1))]
        );
    }

    #[tokio::test]
    async fn receiver_attached_late_is_caught_up() {
        let bridge = LocalBridge::new();
        for id in [7, 3, 5] {
            bridge.add_room(RoomId(id)).await.unwrap();
        }

        let recorder = Arc::new(RecordingReceiver::new());
        bridge.set_receiver(recorder.clone());

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.replayed_rooms(), bridge.rooms());
    }

    #[tokio::test]
    async fn changes_without_receiver_are_kept() {
        let bridge = LocalBridge::new();
        bridge.add_room(RoomId(1)).await.unwrap();
        bridge.add_room(RoomId(2)).await.unwrap();
        bridge.del_room(RoomId(1)).await.unwrap();

        assert!(bridge.start().is_ok());
        assert_eq!(bridge.rooms(), [RoomId(2)].into_iter().collect());
        assert!(bridge.stop().is_ok());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u64),
        Del(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![(0u64..16).prop_map(Op::Add), (0u64..16).prop_map(Op::Del)]
    }

    async fn apply(bridge: &LocalBridge, ops: Vec<Op>) {
        for op in ops {
            match op {
                Op::Add(id) => bridge.add_room(RoomId(id)).await.unwrap(),
                Op::Del(id) => bridge.del_room(RoomId(id)).await.unwrap(),
            }
        }
    }

    proptest! {
        #[test]
        fn replayed_events_reconstruct_final_set(
            before in proptest::collection::vec(op_strategy(), 0..32),
            after in proptest::collection::vec(op_strategy(), 0..64),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let bridge = LocalBridge::new();
                apply(&bridge, before).await;
                let recorder = Arc::new(RecordingReceiver::new());
                bridge.set_receiver(recorder.clone());
                prop_assert_eq!(recorder.len(), bridge.rooms().len());

                apply(&bridge, after).await;
                prop_assert_eq!(recorder.replayed_rooms(), bridge.rooms());
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
