//! # roomkeeper bridge
//!
//! Replication of the tracked room set from publishers to receivers.
//!
//! This crate provides:
//! - `Publisher`, `Receiver` and `Bridge` capabilities
//! - `LocalBridge` for a publisher and receiver in one process
//! - `KvBridge`, which replicates through a coordination store
//! - `Watcher`, a prefix watch that replays the full prefix on every
//!   (re-)establishment
//! - `MemoryKvStore` and `RecordingReceiver` for tests and simulations
//!
//! ## Key Invariants
//!
//! - A receiver only ever sees transitions: no duplicate add, no delete
//!   of an unknown room
//! - After a resynchronization the receiver is told the net difference,
//!   deletions before additions
//! - A receiver attached late is caught up with every known room

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod bridge;
mod error;
mod kv;
mod local;
mod memory;
mod recording;
mod store;
mod watcher;

pub use bridge::{Bridge, Publisher, Receiver};
pub use error::{BridgeError, BridgeResult, StoreError, StoreResult};
pub use kv::{parse_room_key, room_key, BridgeConfig, KvBridge};
pub use local::LocalBridge;
pub use memory::MemoryKvStore;
pub use recording::{RecordingReceiver, RoomEvent};
pub use store::{KvEvent, KvStore, Snapshot, WatchStream};
pub use watcher::{WatchHandler, Watcher};
