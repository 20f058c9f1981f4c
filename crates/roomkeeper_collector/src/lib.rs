//! # roomkeeper collector
//!
//! Live feed ingestion for every tracked room.
//!
//! This crate provides:
//! - `Collector`, the bridge receiver owning one session per room
//! - `RoomSession`, a supervised feed connection with exponential
//!   reconnect backoff
//! - Feed client capabilities (`FeedConnector`, `FeedClient`,
//!   `FeedHandler`) and typed payloads
//! - The `EventSink` persistence interface with an in-memory sink
//! - `MockFeedConnector` for tests and simulations
//!
//! ## Key Invariants
//!
//! - At most one live session per room, and one connection per session
//! - A stopped session never holds a connection
//! - Feed failures are retried until stop; malformed payloads are dropped
//!   without touching the connection

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod collector;
mod config;
mod error;
mod feed;
mod ingest;
mod messages;
mod mock;
mod session;
mod sink;

pub use collector::Collector;
pub use config::CollectorConfig;
pub use error::{CollectorError, CollectorResult, FeedError, FeedResult, SinkError, SinkResult};
pub use feed::{Dispatch, FeedClient, FeedCommand, FeedConnector, FeedEvent, FeedHandler};
pub use messages::{ChatUser, GuardBuy, SendGift, SuperChatMessage};
pub use mock::{MockConnection, MockFeedConnector};
pub use session::{RoomSession, SessionState};
pub use sink::{
    EventSink, GiftInfo, GiftRecord, MembershipRecord, MemoryEventSink, SuperChatRecord,
};
