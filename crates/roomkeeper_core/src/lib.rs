//! # roomkeeper core
//!
//! Shared building blocks for the roomkeeper workspace.
//!
//! This crate provides:
//! - `RoomId` and `RoomSet`, the join key between every component
//! - A pure set-difference utility used for resynchronization (`RoomDelta`)
//! - Exponential retry policy (`RetryConfig`, `Backoff`)
//! - Service configuration loading and validation (`ServiceConfig`)
//!
//! This crate performs no network I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod retry;
mod room;

pub use config::{
    BridgeMode, BridgeSection, CollectorSection, LogLevel, LogSection, RetrySection,
    ServiceConfig, ServiceRoles,
};
pub use error::{CoreError, CoreResult};
pub use retry::{Backoff, RetryConfig};
pub use room::{difference, RoomDelta, RoomId, RoomSet};
