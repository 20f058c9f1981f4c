//! Live feed client abstraction.
//!
//! The wire protocol of the live feed is not implemented here. A
//! [`FeedConnector`] dials one room and hands inbound traffic to a
//! [`FeedHandler`]: one call per command, plus one call when the
//! connection is lost.

use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use bytes::Bytes;
use roomkeeper_core::RoomId;
use std::fmt;
use std::sync::Arc;

/// Feed commands a session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedCommand {
    /// Paid highlighted chat message.
    SuperChat,
    /// Membership (guard) purchase.
    GuardBuy,
    /// Gift sent to the streamer.
    Gift,
}

impl FeedCommand {
    /// All subscribed commands.
    pub const ALL: [FeedCommand; 3] = [FeedCommand::SuperChat, FeedCommand::GuardBuy, FeedCommand::Gift];

    /// Wire name of the command.
    pub fn name(self) -> &'static str {
        match self {
            FeedCommand::SuperChat => "SUPER_CHAT_MESSAGE",
            FeedCommand::GuardBuy => "GUARD_BUY",
            FeedCommand::Gift => "SEND_GIFT",
        }
    }

    /// Looks up a command by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }
}

impl fmt::Display for FeedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEvent {
    /// Command the payload belongs to.
    pub command: FeedCommand,
    /// Raw JSON payload.
    pub payload: Bytes,
}

impl FeedEvent {
    /// Creates an event.
    pub fn new(command: FeedCommand, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }
}

/// What the feed client should do after delivering an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Keep reading.
    Continue,
    /// Stop reading and drop the connection.
    Close,
}

/// Receives inbound traffic of one connection.
///
/// Called from the feed client's reader, so implementations must not
/// block.
pub trait FeedHandler: Send + Sync {
    /// Handles one message.
    fn on_event(&self, event: FeedEvent) -> Dispatch;

    /// The connection failed or was closed by the server.
    fn on_disconnect(&self, error: FeedError);
}

/// An open feed connection.
pub trait FeedClient: Send + Sync {
    /// Closes the connection. Closing twice has no further effect.
    fn close(&self);
}

/// Opens feed connections.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Dials the feed of `room_id`, delivering traffic to `handler`.
    async fn dial(
        &self,
        room_id: RoomId,
        handler: Arc<dyn FeedHandler>,
    ) -> FeedResult<Box<dyn FeedClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_round_trip() {
        for command in FeedCommand::ALL {
            assert_eq!(FeedCommand::from_name(command.name()), Some(command));
        }
        assert_eq!(FeedCommand::from_name("DANMU_MSG"), None);
        assert_eq!(FeedCommand::Gift.to_string(), "SEND_GIFT");
    }
}
