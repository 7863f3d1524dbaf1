use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChannelId, HistoryMessage, MessageRef};

/// Message primitives of the chat platform the bot is attached to.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Up to `limit` most recent messages, newest first.
    async fn fetch_history(&self, channel: ChannelId, limit: usize) -> Result<Vec<HistoryMessage>>;

    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<MessageRef>;

    /// Posts `text` as a reply to `target` in the same channel.
    async fn reply(&self, target: MessageRef, text: &str) -> Result<MessageRef>;

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<()>;

    async fn channel_name(&self, channel: ChannelId) -> Result<String>;
}
