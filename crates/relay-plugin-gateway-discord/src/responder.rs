use std::sync::Arc;

use relay_core::text::{fill_template, strip_mentions, truncate_chars};
use relay_core::{BotConfig, ChatPlatform, HistoryMessage, IncomingMessage, Result};
use relay_plugin_inference::{InferenceRequest, SchedulerHandle};
use relay_plugin_summary::ChannelSummaryManager;
use tracing::{debug, warn};

/// Hard cap on a single chat message.
pub const MAX_MESSAGE_CHARS: usize = 2000;
/// Per-line cap for history quoted into a reply prompt.
pub const HISTORY_LINE_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct ResponderSettings {
    /// Template with `{user}`, `{question}` and `{history}` placeholders.
    pub question_prompt: String,
    pub history_lines: usize,
}

impl ResponderSettings {
    pub fn from_config(bot: &BotConfig) -> Self {
        Self {
            question_prompt: bot.question_prompt.clone(),
            history_lines: bot.history_lines,
        }
    }
}

pub fn format_question(template: &str, user: &str, question: &str, history: &str) -> String {
    fill_template(
        template,
        &[("user", user), ("question", question), ("history", history)],
    )
}

/// Recent history as `author: text` lines, oldest first, minus the question itself.
pub fn history_text(history: &[HistoryMessage], question: &str) -> String {
    let mut lines: Vec<String> = history
        .iter()
        .filter_map(|msg| {
            let cleaned = strip_mentions(&msg.content);
            (cleaned != question).then(|| {
                format!(
                    "{}: {}",
                    msg.author,
                    truncate_chars(&cleaned, HISTORY_LINE_CHARS)
                )
            })
        })
        .collect();
    lines.reverse();
    lines.join("\n")
}

pub fn placeholder_text(average_minutes: f64) -> String {
    format!("Generating, wait a minute... (average time: {average_minutes:.2} minutes)")
}

/// Turns chat events into scheduled replies and feeds the summary manager.
pub struct Responder {
    platform: Arc<dyn ChatPlatform>,
    scheduler: SchedulerHandle,
    summaries: Arc<ChannelSummaryManager>,
    settings: ResponderSettings,
}

impl Responder {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        scheduler: SchedulerHandle,
        summaries: Arc<ChannelSummaryManager>,
        settings: ResponderSettings,
    ) -> Self {
        Self {
            platform,
            scheduler,
            summaries,
            settings,
        }
    }

    pub async fn handle(&self, msg: IncomingMessage) {
        if msg.from_self {
            return;
        }
        if msg.mentions_bot {
            if let Err(e) = self.answer(&msg).await {
                warn!(channel = %msg.channel_id(), "Could not queue a reply: {e}");
            }
        }
        self.summaries.observe(msg.channel_id()).await;
    }

    async fn answer(&self, msg: &IncomingMessage) -> Result<()> {
        let channel = msg.channel_id();
        let question = strip_mentions(&msg.content);
        let history = self
            .platform
            .fetch_history(channel, self.settings.history_lines + 1)
            .await?;

        let mut context = String::new();
        if let Some(summary) = self.summaries.summary(channel) {
            context.push_str("[Summary]\n");
            context.push_str(&summary);
            context.push_str("[End Summary]\n");
        }
        context.push_str(&history_text(&history, &question));
        let prompt = format_question(
            &self.settings.question_prompt,
            &msg.author,
            &question,
            &context,
        );

        let average_minutes = self.scheduler.average_latency().as_secs_f64() / 60.0;
        let placeholder = self
            .platform
            .reply(msg.message, &placeholder_text(average_minutes))
            .await?;
        debug!(%channel, author = %msg.author, "Reply placeholder posted");

        let platform = self.platform.clone();
        self.scheduler.submit(
            InferenceRequest::new(prompt, move |output| async move {
                platform
                    .edit_message(placeholder, truncate_chars(&output, MAX_MESSAGE_CHARS))
                    .await?;
                Ok(())
            })
            .role(msg.author.clone()),
        );
        Ok(())
    }
}
