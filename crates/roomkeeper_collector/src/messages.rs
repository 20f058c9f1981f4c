//! Typed feed payloads.
//!
//! Only the fields the collector persists are modelled; everything else
//! in a payload is ignored.

use crate::error::{CollectorError, CollectorResult};
use crate::feed::FeedCommand;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

fn decode<T: DeserializeOwned>(command: FeedCommand, payload: &[u8]) -> CollectorResult<T> {
    serde_json::from_slice(payload).map_err(|source| CollectorError::Decode {
        command: command.name(),
        source,
    })
}

/// Sender details attached to a super chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    /// Display name.
    pub uname: String,
}

/// `SUPER_CHAT_MESSAGE` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperChatMessage {
    /// Sender user ID.
    pub uid: i64,
    /// Price in the feed's currency unit.
    pub price: i64,
    /// Message text.
    pub message: String,
    /// Highlight background color.
    #[serde(default)]
    pub background_color: String,
    /// Message font color.
    #[serde(default)]
    pub message_font_color: String,
    /// Send time, seconds since the epoch.
    pub ts: i64,
    /// Sender details.
    pub user_info: ChatUser,
}

impl SuperChatMessage {
    /// Decodes a raw payload.
    pub fn decode(payload: &[u8]) -> CollectorResult<Self> {
        decode(FeedCommand::SuperChat, payload)
    }
}

/// `GUARD_BUY` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardBuy {
    /// Buyer user ID.
    pub uid: i64,
    /// Buyer display name.
    pub username: String,
    /// Membership tier (1 highest).
    pub guard_level: i32,
    /// Number of periods bought.
    pub num: i32,
    /// Purchase time, seconds since the epoch.
    pub start_time: i64,
}

impl GuardBuy {
    /// Decodes a raw payload.
    pub fn decode(payload: &[u8]) -> CollectorResult<Self> {
        decode(FeedCommand::GuardBuy, payload)
    }
}

/// `SEND_GIFT` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendGift {
    /// Sender user ID.
    pub uid: i64,
    /// Sender display name.
    pub uname: String,
    /// Gift catalog ID.
    #[serde(rename = "giftId")]
    pub gift_id: i64,
    /// Gift name.
    #[serde(rename = "giftName")]
    pub gift_name: String,
    /// Unit price.
    pub price: i64,
    /// Number of gifts in this message.
    pub num: i64,
    /// Currency the gift was paid with.
    pub coin_type: String,
    /// Combo batch the message belongs to, empty when not part of one.
    #[serde(default)]
    pub batch_combo_id: String,
    /// Send time, seconds since the epoch.
    pub timestamp: i64,
}

impl SendGift {
    /// Decodes a raw payload.
    pub fn decode(payload: &[u8]) -> CollectorResult<Self> {
        decode(FeedCommand::Gift, payload)
    }

    /// Returns true for gifts paid in premium currency.
    pub fn is_paid(&self) -> bool {
        self.coin_type == "gold"
    }

    /// Key under which repeated messages of one gift batch aggregate.
    pub fn batch_key(&self) -> String {
        if self.batch_combo_id.is_empty() {
            format!("{}-{}-{}", self.uid, self.gift_id, self.timestamp)
        } else {
            self.batch_combo_id.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn decode_super_chat() {
        let payload = bytes(json!({
            "uid": 1001,
            "price": 30,
            "message": "hello",
            "background_color": "#EDF5FF",
            "message_font_color": "#A3F6FF",
            "ts": 1_700_000_000,
            "user_info": { "uname": "alice", "face": "ignored" },
            "id": 77
        }));

        let msg = SuperChatMessage::decode(&payload).unwrap();
        assert_eq!(msg.uid, 1001);
        assert_eq!(msg.user_info.uname, "alice");
        assert_eq!(msg.background_color, "#EDF5FF");
    }

    #[test]
    fn decode_guard_buy() {
        let payload = bytes(json!({
            "uid": 7,
            "username": "bob",
            "guard_level": 3,
            "num": 1,
            "price": 198_000,
            "start_time": 1_700_000_100,
            "end_time": 1_700_000_100
        }));

        let msg = GuardBuy::decode(&payload).unwrap();
        assert_eq!(msg.guard_level, 3);
        assert_eq!(msg.start_time, 1_700_000_100);
    }

    #[test]
    fn decode_gift_uses_wire_names() {
        let payload = bytes(json!({
            "uid": 9,
            "uname": "carol",
            "giftId": 31036,
            "giftName": "flower",
            "price": 100,
            "num": 5,
            "coin_type": "gold",
            "batch_combo_id": "batch:gift:combo_id:9:31036",
            "timestamp": 1_700_000_200
        }));

        let gift = SendGift::decode(&payload).unwrap();
        assert_eq!(gift.gift_id, 31036);
        assert!(gift.is_paid());
        assert_eq!(gift.batch_key(), "batch:gift:combo_id:9:31036");
    }

    #[test]
    fn batch_key_falls_back_without_combo() {
        let payload = bytes(json!({
            "uid": 9,
            "uname": "carol",
            "giftId": 1,
            "giftName": "stick",
            "price": 0,
            "num": 1,
            "coin_type": "silver",
            "timestamp": 42
        }));

        let gift = SendGift::decode(&payload).unwrap();
        assert!(!gift.is_paid());
        assert_eq!(gift.batch_key(), "9-1-42");
    }

    #[test]
    fn malformed_payload_names_command() {
        let err = SendGift::decode(b"{\"uid\": \"nope\"}").unwrap_err();
        assert!(matches!(err, CollectorError::Decode { command: "SEND_GIFT", .. }));
        assert!(GuardBuy::decode(b"not json").is_err());
    }
}
