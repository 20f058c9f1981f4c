//! Persistence interface for ingested events.

use crate::error::{SinkError, SinkResult};
use parking_lot::Mutex;
use roomkeeper_core::RoomId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A stored super chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperChatRecord {
    /// Room the message was sent in.
    pub room_id: RoomId,
    /// Send time, seconds since the epoch.
    pub send_time: i64,
    /// Sender user ID.
    pub sender_uid: i64,
    /// Sender display name.
    pub sender_name: String,
    /// Price paid.
    pub price: i64,
    /// Message text.
    pub content: String,
    /// Highlight background color.
    pub background_color: String,
    /// Message font color.
    pub font_color: String,
}

/// A stored membership purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    /// Room the purchase was made in.
    pub room_id: RoomId,
    /// Purchase time, seconds since the epoch.
    pub send_time: i64,
    /// Buyer user ID.
    pub sender_uid: i64,
    /// Buyer display name.
    pub sender_name: String,
    /// Membership tier.
    pub guard_level: i32,
    /// Number of periods bought.
    pub count: i32,
}

/// A stored gift batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftRecord {
    /// Aggregation key; one record per batch.
    pub batch_id: String,
    /// Room the gift was sent in.
    pub room_id: RoomId,
    /// Time of the first message of the batch.
    pub send_time: i64,
    /// Sender user ID.
    pub sender_uid: i64,
    /// Sender display name.
    pub sender_name: String,
    /// Gift catalog ID.
    pub gift_id: i64,
    /// Gift name.
    pub gift_name: String,
    /// Unit price.
    pub gift_price: i64,
    /// Number of gifts in the batch so far.
    pub gift_count: i64,
}

/// A gift catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftInfo {
    /// Gift catalog ID.
    pub gift_id: i64,
    /// Gift name.
    pub gift_name: String,
    /// Unit price.
    pub gift_price: i64,
}

/// Storage for ingested events.
///
/// Called synchronously from feed handlers.
pub trait EventSink: Send + Sync {
    /// Appends a super chat.
    fn insert_super_chat(&self, record: &SuperChatRecord) -> SinkResult<()>;

    /// Appends a membership purchase.
    fn insert_membership(&self, record: &MembershipRecord) -> SinkResult<()>;

    /// Inserts a gift batch, or adds `gift_count` to the existing batch
    /// with the same `batch_id`.
    fn upsert_gift(&self, record: &GiftRecord) -> SinkResult<()>;

    /// Adds a gift to the catalog unless its ID is already known.
    fn record_gift_info(&self, info: &GiftInfo) -> SinkResult<()>;
}

#[derive(Default)]
struct Tables {
    super_chats: Vec<SuperChatRecord>,
    memberships: Vec<MembershipRecord>,
    gifts: Vec<GiftRecord>,
    gift_index: HashMap<String, usize>,
    gift_catalog: BTreeMap<i64, GiftInfo>,
    failing: bool,
}

impl Tables {
    fn check(&self) -> SinkResult<()> {
        if self.failing {
            Err(SinkError::Storage("sink marked failing".into()))
        } else {
            Ok(())
        }
    }
}

/// In-memory event sink for tests and simulations.
#[derive(Default)]
pub struct MemoryEventSink {
    tables: Mutex<Tables>,
}

impl MemoryEventSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail.
    pub fn set_failing(&self, failing: bool) {
        self.tables.lock().failing = failing;
    }

    /// Stored super chats, in insertion order.
    pub fn super_chats(&self) -> Vec<SuperChatRecord> {
        self.tables.lock().super_chats.clone()
    }

    /// Stored membership purchases, in insertion order.
    pub fn memberships(&self) -> Vec<MembershipRecord> {
        self.tables.lock().memberships.clone()
    }

    /// Stored gift batches, in order of first appearance.
    pub fn gifts(&self) -> Vec<GiftRecord> {
        self.tables.lock().gifts.clone()
    }

    /// Looks up a gift batch.
    pub fn gift(&self, batch_id: &str) -> Option<GiftRecord> {
        let tables = self.tables.lock();
        let index = *tables.gift_index.get(batch_id)?;
        tables.gifts.get(index).cloned()
    }

    /// Gift catalog, ordered by ID.
    pub fn gift_catalog(&self) -> Vec<GiftInfo> {
        self.tables.lock().gift_catalog.values().cloned().collect()
    }

    /// Total number of stored rows across all tables.
    pub fn row_count(&self) -> usize {
        let tables = self.tables.lock();
        tables.super_chats.len() + tables.memberships.len() + tables.gifts.len()
    }
}

impl EventSink for MemoryEventSink {
    fn insert_super_chat(&self, record: &SuperChatRecord) -> SinkResult<()> {
        let mut tables = self.tables.lock();
        tables.check()?;
        tables.super_chats.push(record.clone());
        Ok(())
    }

    fn insert_membership(&self, record: &MembershipRecord) -> SinkResult<()> {
        let mut tables = self.tables.lock();
        tables.check()?;
        tables.memberships.push(record.clone());
        Ok(())
    }

    fn upsert_gift(&self, record: &GiftRecord) -> SinkResult<()> {
        let mut tables = self.tables.lock();
        tables.check()?;

        if let Some(&index) = tables.gift_index.get(&record.batch_id) {
            if let Some(existing) = tables.gifts.get_mut(index) {
                existing.gift_count += record.gift_count;
            }
            return Ok(());
        }

        let index = tables.gifts.len();
        tables.gift_index.insert(record.batch_id.clone(), index);
        tables.gifts.push(record.clone());
        Ok(())
    }

    fn record_gift_info(&self, info: &GiftInfo) -> SinkResult<()> {
        let mut tables = self.tables.lock();
        tables.check()?;
        tables
            .gift_catalog
            .entry(info.gift_id)
            .or_insert_with(|| info.clone());
        Ok(())
    }
}
