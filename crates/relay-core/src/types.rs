use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a message already posted on the chat surface.
///
/// Completion callbacks carry this value instead of a live client object and
/// resolve it through [`crate::ChatPlatform`] at delivery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: u64,
}

/// A message pulled from channel history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub author: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// An inbound chat event as seen by the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message: MessageRef,
    pub author: String,
    pub content: String,
    pub mentions_bot: bool,
    pub from_self: bool,
}

impl IncomingMessage {
    pub fn channel_id(&self) -> ChannelId {
        self.message.channel_id
    }
}
