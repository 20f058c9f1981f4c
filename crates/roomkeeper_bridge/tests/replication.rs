//! Integration tests for room-set replication through a shared store.

use roomkeeper_bridge::{
    Bridge, BridgeConfig, BridgeError, KvBridge, KvStore, MemoryKvStore, Publisher,
    RecordingReceiver, RoomEvent, StoreError,
};
use roomkeeper_core::{RoomId, RoomSet};
use std::sync::Arc;
use std::time::Duration;

fn config() -> BridgeConfig {
    BridgeConfig::new("room_").with_watch_retry_delay(Duration::from_millis(20))
}

fn rooms(ids: &[u64]) -> RoomSet {
    ids.iter().copied().map(RoomId).collect()
}

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn changes_propagate_between_processes() {
    let store = Arc::new(MemoryKvStore::new());
    let publisher = KvBridge::new(store.clone(), config());
    let consumer = KvBridge::new(store.clone(), config());

    let recorder = Arc::new(RecordingReceiver::new());
    consumer.set_receiver(recorder.clone());
    consumer.start().unwrap();

    publisher.add_room(RoomId(10)).await.unwrap();
    publisher.add_room(RoomId(20)).await.unwrap();
    eventually("two additions", || recorder.len() == 2).await;

    publisher.del_room(RoomId(10)).await.unwrap();
    eventually("one removal", || recorder.len() == 3).await;

    assert_eq!(
        recorder.events(),
        vec![
            RoomEvent::Added(RoomId(10)),
            RoomEvent::Added(RoomId(20)),
            RoomEvent::Removed(RoomId(10)),
        ]
    );
    assert_eq!(consumer.rooms(), rooms(&[20]));
    assert_eq!(store.keys(), vec!["room_20".to_string()]);

    consumer.stop().unwrap();
}

#[tokio::test]
async fn existing_rooms_replayed_on_start() {
    let store = Arc::new(MemoryKvStore::new());
    let publisher = KvBridge::new(store.clone(), config());
    for id in [3, 1, 2] {
        publisher.add_room(RoomId(id)).await.unwrap();
    }
    store.put("room_garbage", b"-").await.unwrap();

    let consumer = KvBridge::new(store.clone(), config());
    let recorder = Arc::new(RecordingReceiver::new());
    consumer.set_receiver(recorder.clone());
    consumer.start().unwrap();

    eventually("initial replay", || recorder.len() == 3).await;
    assert_eq!(recorder.replayed_rooms(), rooms(&[1, 2, 3]));

    consumer.stop().unwrap();
}

#[tokio::test]
async fn reconnect_delivers_net_difference() {
    let store = Arc::new(MemoryKvStore::new());
    let publisher = KvBridge::new(store.clone(), config());
    for id in [1, 2, 3] {
        publisher.add_room(RoomId(id)).await.unwrap();
    }

    let consumer = KvBridge::new(store.clone(), config());
    let recorder = Arc::new(RecordingReceiver::new());
    consumer.set_receiver(recorder.clone());
    consumer.start().unwrap();
    eventually("initial replay", || recorder.len() == 3).await;
    eventually("watch registration", || store.watch_count() == 1).await;
    recorder.take_events();

    // Changes made while the watch is down are only seen by the replay.
    store.break_watches();
    publisher.del_room(RoomId(1)).await.unwrap();
    publisher.add_room(RoomId(4)).await.unwrap();
    publisher.del_room(RoomId(2)).await.unwrap();
    publisher.add_room(RoomId(2)).await.unwrap();

    eventually("resynchronization", || recorder.len() == 2).await;
    assert_eq!(
        recorder.events(),
        vec![RoomEvent::Removed(RoomId(1)), RoomEvent::Added(RoomId(4))]
    );
    assert_eq!(consumer.rooms(), rooms(&[2, 3, 4]));

    consumer.stop().unwrap();
}

#[tokio::test]
async fn watch_recovers_after_outage() {
    let store = Arc::new(MemoryKvStore::new());
    store.set_unavailable(true);

    let consumer = KvBridge::new(store.clone(), config());
    let recorder = Arc::new(RecordingReceiver::new());
    consumer.set_receiver(recorder.clone());
    consumer.start().unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(recorder.is_empty());

    store.set_unavailable(false);
    store.put("room_7", b"-").await.unwrap();

    eventually("recovery", || recorder.len() == 1).await;
    assert_eq!(recorder.events(), vec![RoomEvent::Added(RoomId(7))]);

    consumer.stop().unwrap();
}

#[tokio::test]
async fn stop_prevents_reconnect() {
    let store = Arc::new(MemoryKvStore::new());
    let consumer = KvBridge::new(store.clone(), config());
    consumer.set_receiver(Arc::new(RecordingReceiver::new()));
    consumer.start().unwrap();
    eventually("watch registration", || store.watch_count() == 1).await;

    consumer.stop().unwrap();
    consumer.stop().unwrap();
    store.break_watches();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(store.watch_count(), 0);
    assert!(consumer.is_stopped());
}

#[tokio::test]
async fn publish_failure_is_reported() {
    let store = Arc::new(MemoryKvStore::new());
    let publisher = KvBridge::new(store.clone(), config());
    store.set_unavailable(true);

    let err = publisher.add_room(RoomId(1)).await.unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Store(StoreError::Unavailable(_))
    ));
    assert!(publisher.del_room(RoomId(1)).await.is_err());
}

#[tokio::test]
async fn late_receiver_is_caught_up() {
    let store = Arc::new(MemoryKvStore::new());
    let consumer = KvBridge::new(store.clone(), config());
    consumer.start().unwrap();

    store.put("room_5", b"-").await.unwrap();
    store.put("room_6", b"-").await.unwrap();
    eventually("live set", || consumer.rooms().len() == 2).await;

    let recorder = Arc::new(RecordingReceiver::new());
    consumer.set_receiver(recorder.clone());
    assert_eq!(recorder.replayed_rooms(), rooms(&[5, 6]));

    store.delete("room_5").await.unwrap();
    eventually("removal", || recorder.len() == 3).await;
    assert_eq!(recorder.events()[2], RoomEvent::Removed(RoomId(5)));

    consumer.stop().unwrap();
}
