use std::time::Duration;

use relay_core::text::split_chunks;
use relay_core::{ChannelId, ChatPlatform, Result};

pub const FOOTER: &str = "----------------------------";

pub fn header(channel_name: &str) -> String {
    format!("----- Channel Summary: {channel_name} -----")
}

/// Cuts `summary` into postable messages: header on the first, footer on the last.
pub fn frame_chunks(summary: &str, channel_name: &str, budget: usize) -> Vec<String> {
    let chunks = split_chunks(summary, budget);
    let last = chunks.len().saturating_sub(1);
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut message = String::new();
            if i == 0 {
                message.push_str(&header(channel_name));
                message.push('\n');
            }
            message.push_str(chunk);
            if i == last {
                message.push('\n');
                message.push_str(FOOTER);
            }
            message
        })
        .collect()
}

/// Posts `messages` in order, pausing `delay` between sends.
///
/// Stops at the first failed send; returns how many messages went out.
pub async fn deliver(
    platform: &dyn ChatPlatform,
    destination: ChannelId,
    messages: &[String],
    delay: Duration,
) -> Result<usize> {
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        platform.send_message(destination, message).await?;
    }
    Ok(messages.len())
}
