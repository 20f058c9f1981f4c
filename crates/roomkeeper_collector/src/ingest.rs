//! Decoding of inbound events into sink writes.

use crate::feed::{FeedCommand, FeedEvent};
use crate::messages::{GuardBuy, SendGift, SuperChatMessage};
use crate::sink::{EventSink, GiftInfo, GiftRecord, MembershipRecord, SuperChatRecord};
use roomkeeper_core::RoomId;
use tracing::{debug, error, warn};

/// Persists one inbound event of `room_id`.
///
/// Undecodable payloads and failed writes are logged and dropped; neither
/// affects the connection the event arrived on.
pub(crate) fn ingest(room_id: RoomId, sink: &dyn EventSink, event: &FeedEvent) {
    let payload = event.payload.as_ref();
    match event.command {
        FeedCommand::SuperChat => match SuperChatMessage::decode(payload) {
            Ok(msg) => super_chat(room_id, sink, msg, payload),
            Err(err) => warn!(%room_id, "dropping message: {}", err),
        },
        FeedCommand::GuardBuy => match GuardBuy::decode(payload) {
            Ok(msg) => guard_buy(room_id, sink, msg, payload),
            Err(err) => warn!(%room_id, "dropping message: {}", err),
        },
        FeedCommand::Gift => match SendGift::decode(payload) {
            Ok(msg) => gift(room_id, sink, msg, payload),
            Err(err) => warn!(%room_id, "dropping message: {}", err),
        },
    }
}

fn super_chat(room_id: RoomId, sink: &dyn EventSink, msg: SuperChatMessage, raw: &[u8]) {
    let record = SuperChatRecord {
        room_id,
        send_time: msg.ts,
        sender_uid: msg.uid,
        sender_name: msg.user_info.uname,
        price: msg.price,
        content: msg.message,
        background_color: msg.background_color,
        font_color: msg.message_font_color,
    };
    if let Err(err) = sink.insert_super_chat(&record) {
        error!(
            %room_id,
            "insert super chat failed: {}, original: {}",
            err,
            String::from_utf8_lossy(raw)
        );
    }
}

fn guard_buy(room_id: RoomId, sink: &dyn EventSink, msg: GuardBuy, raw: &[u8]) {
    let record = MembershipRecord {
        room_id,
        send_time: msg.start_time,
        sender_uid: msg.uid,
        sender_name: msg.username,
        guard_level: msg.guard_level,
        count: msg.num,
    };
    if let Err(err) = sink.insert_membership(&record) {
        error!(
            %room_id,
            "insert membership failed: {}, original: {}",
            err,
            String::from_utf8_lossy(raw)
        );
    }
}

fn gift(room_id: RoomId, sink: &dyn EventSink, msg: SendGift, raw: &[u8]) {
    if !msg.is_paid() {
        debug!(%room_id, coin_type = %msg.coin_type, "skipping free gift");
        return;
    }

    let record = GiftRecord {
        batch_id: msg.batch_key(),
        room_id,
        send_time: msg.timestamp,
        sender_uid: msg.uid,
        sender_name: msg.uname,
        gift_id: msg.gift_id,
        gift_name: msg.gift_name,
        gift_price: msg.price,
        gift_count: msg.num,
    };
    if let Err(err) = sink.upsert_gift(&record) {
        error!(
            %room_id,
            "insert gift failed: {}, original: {}",
            err,
            String::from_utf8_lossy(raw)
        );
    }

    let info = GiftInfo {
        gift_id: record.gift_id,
        gift_name: record.gift_name,
        gift_price: record.gift_price,
    };
    if let Err(err) = sink.record_gift_info(&info) {
        warn!(%room_id, gift_id = info.gift_id, "gift catalog update failed: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryEventSink;
    use serde_json::json;

    fn event(command: FeedCommand, value: serde_json::Value) -> FeedEvent {
        FeedEvent::new(command, serde_json::to_vec(&value).unwrap())
    }

    fn gift_event(batch: &str, num: i64, coin_type: &str) -> FeedEvent {
        event(
            FeedCommand::Gift,
            json!({
                "uid": 9,
                "uname": "carol",
                "giftId": 31036,
                "giftName": "flower",
                "price": 100,
                "num": num,
                "coin_type": coin_type,
                "batch_combo_id": batch,
                "timestamp": 1_700_000_200
            }),
        )
    }

    #[test]
    fn super_chat_is_stored() {
        let sink = MemoryEventSink::new();
        ingest(
            RoomId(3),
            &sink,
            &event(
                FeedCommand::SuperChat,
                json!({
                    "uid": 1001,
                    "price": 30,
                    "message": "hello",
                    "background_color": "#EDF5FF",
                    "message_font_color": "#A3F6FF",
                    "ts": 1_700_000_000,
                    "user_info": { "uname": "alice" }
                }),
            ),
        );

        let stored = sink.super_chats();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].room_id, RoomId(3));
        assert_eq!(stored[0].sender_name, "alice");
        assert_eq!(stored[0].content, "hello");
        assert_eq!(stored[0].font_color, "#A3F6FF");
    }

    #[test]
    fn membership_is_stored() {
        let sink = MemoryEventSink::new();
        ingest(
            RoomId(3),
            &sink,
            &event(
                FeedCommand::GuardBuy,
                json!({
                    "uid": 7,
                    "username": "bob",
                    "guard_level": 2,
                    "num": 3,
                    "start_time": 1_700_000_100
                }),
            ),
        );

        let stored = sink.memberships();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].guard_level, 2);
        assert_eq!(stored[0].count, 3);
        assert_eq!(stored[0].send_time, 1_700_000_100);
    }

    #[test]
    fn gift_batches_aggregate_and_register_catalog() {
        let sink = MemoryEventSink::new();
        ingest(RoomId(3), &sink, &gift_event("combo-1", 1, "gold"));
        ingest(RoomId(3), &sink, &gift_event("combo-1", 2, "gold"));
        ingest(RoomId(3), &sink, &gift_event("combo-2", 5, "gold"));

        assert_eq!(sink.gifts().len(), 2);
        assert_eq!(sink.gift("combo-1").unwrap().gift_count, 3);
        assert_eq!(sink.gift_catalog().len(), 1);
        assert_eq!(sink.gift_catalog()[0].gift_name, "flower");
    }

    #[test]
    fn free_gifts_are_skipped() {
        let sink = MemoryEventSink::new();
        ingest(RoomId(3), &sink, &gift_event("combo-1", 1, "silver"));
        assert_eq!(sink.row_count(), 0);
        assert!(sink.gift_catalog().is_empty());
    }

    #[test]
    fn undecodable_payload_writes_nothing() {
        let sink = MemoryEventSink::new();
        ingest(RoomId(3), &sink, &FeedEvent::new(FeedCommand::Gift, &b"{\"uid\":"[..]));
        ingest(RoomId(3), &sink, &FeedEvent::new(FeedCommand::SuperChat, &b"[]"[..]));
        assert_eq!(sink.row_count(), 0);
    }

    #[test]
    fn sink_failure_is_absorbed() {
        let sink = MemoryEventSink::new();
        sink.set_failing(true);
        ingest(RoomId(3), &sink, &gift_event("combo-1", 1, "gold"));

        sink.set_failing(false);
        ingest(RoomId(3), &sink, &gift_event("combo-1", 1, "gold"));
        assert_eq!(sink.gift("combo-1").unwrap().gift_count, 1);
    }
}
