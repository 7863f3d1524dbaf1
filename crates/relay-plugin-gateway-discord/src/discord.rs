use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{ChannelId, ChatPlatform, HistoryMessage, IncomingMessage, MessageRef, RelayError, Result};
use serenity::all::{
    Channel, Client, Context, CreateMessage, EditMessage, EventHandler, GatewayIntents,
    GetMessages, Http, Message, MessageId, Ready, UserId,
};

use crate::responder::Responder;

/// Discord caps a single history page at 100 messages.
const PAGE_LIMIT: usize = 100;

fn platform_err(e: serenity::Error) -> RelayError {
    RelayError::PlatformError(e.to_string())
}

fn discord_channel(channel: ChannelId) -> serenity::all::ChannelId {
    serenity::all::ChannelId::new(channel.0)
}

fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        channel_id: ChannelId(msg.channel_id.get()),
        message_id: msg.id.get(),
    }
}

/// [`ChatPlatform`] over the Discord REST API.
pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
        }
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn fetch_history(&self, channel: ChannelId, limit: usize) -> Result<Vec<HistoryMessage>> {
        let channel = discord_channel(channel);
        let mut history = Vec::with_capacity(limit);
        let mut before: Option<MessageId> = None;
        while history.len() < limit {
            let batch = (limit - history.len()).min(PAGE_LIMIT);
            let mut builder = GetMessages::new().limit(batch as u8);
            if let Some(id) = before {
                builder = builder.before(id);
            }
            let page = channel
                .messages(&self.http, builder)
                .await
                .map_err(platform_err)?;
            let Some(oldest) = page.last() else {
                break;
            };
            before = Some(oldest.id);
            let fetched = page.len();
            history.extend(page.into_iter().map(|msg| HistoryMessage {
                author: msg.author.name,
                content: msg.content,
                timestamp: DateTime::<Utc>::from_timestamp(msg.timestamp.unix_timestamp(), 0)
                    .unwrap_or_default(),
            }));
            if fetched < batch {
                break;
            }
        }
        Ok(history)
    }

    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<MessageRef> {
        let sent = discord_channel(channel)
            .say(&self.http, text)
            .await
            .map_err(platform_err)?;
        Ok(message_ref(&sent))
    }

    async fn reply(&self, target: MessageRef, text: &str) -> Result<MessageRef> {
        let channel = discord_channel(target.channel_id);
        let builder = CreateMessage::new()
            .content(text)
            .reference_message((channel, MessageId::new(target.message_id)));
        let sent = channel
            .send_message(&self.http, builder)
            .await
            .map_err(platform_err)?;
        Ok(message_ref(&sent))
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<()> {
        discord_channel(message.channel_id)
            .edit_message(
                &self.http,
                MessageId::new(message.message_id),
                EditMessage::new().content(text),
            )
            .await
            .map_err(platform_err)?;
        Ok(())
    }

    async fn channel_name(&self, channel: ChannelId) -> Result<String> {
        let name = match self
            .http
            .get_channel(discord_channel(channel))
            .await
            .map_err(platform_err)?
        {
            Channel::Guild(c) => c.name,
            Channel::Private(c) => c.name(),
            _ => channel.to_string(),
        };
        Ok(name)
    }
}

struct Handler {
    responder: Arc<Responder>,
    bot_user_id: Arc<AtomicU64>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, _ctx: Context, msg: Message) {
        let bot_id = self.bot_user_id.load(Ordering::Relaxed);
        let known = bot_id != 0;
        let incoming = IncomingMessage {
            message: message_ref(&msg),
            author: msg.author.name.clone(),
            mentions_bot: known && msg.mentions_user_id(UserId::new(bot_id)),
            from_self: known && msg.author.id.get() == bot_id,
            content: msg.content,
        };
        self.responder.handle(incoming).await;
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_user_id.store(ready.user.id.get(), Ordering::Relaxed);
        tracing::info!("Discord bot connected as {} (id={})", ready.user.name, ready.user.id.get());
    }
}

pub async fn start_discord_bot(token: String, responder: Arc<Responder>) -> anyhow::Result<()> {
    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;
    let bot_user_id = Arc::new(AtomicU64::new(0));
    let handler = Handler { responder, bot_user_id };
    let mut client = Client::builder(&token, intents)
        .event_handler(handler)
        .await?;
    client.start().await?;
    Ok(())
}
