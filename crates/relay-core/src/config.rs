use std::path::Path;

use serde::Deserialize;

use crate::error::{RelayError, Result};
use crate::types::ChannelId;

pub const TOKEN_ENV: &str = "RELAY_DISCORD_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    pub model: ModelConfig,
    pub bot: BotConfig,
    pub summary: SummaryConfig,
}

/// Inference endpoint and prompt format.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub endpoint: String,
    /// Template with `{system}`, `{prompt}` and `{user}` placeholders.
    pub prompt_format: String,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub identity: String,
    /// Template with `{user}`, `{question}` and `{history}` placeholders.
    pub question_prompt: String,
    #[serde(default = "default_tokens")]
    pub tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_history_lines")]
    pub history_lines: usize,
    #[serde(default)]
    pub discord_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    pub reporting_channel: ChannelId,
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval: u64,
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,
    #[serde(default = "default_summary_tokens")]
    pub summary_tokens: u32,
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
    #[serde(default = "default_message_chars")]
    pub message_chars: usize,
}

fn default_repeat_penalty() -> f64 {
    1.2
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_tokens() -> u32 {
    256
}

fn default_temperature() -> f64 {
    0.7
}

fn default_history_lines() -> usize {
    10
}

fn default_snapshot_interval() -> u64 {
    10
}

fn default_snapshot_limit() -> usize {
    100
}

fn default_summary_tokens() -> u32 {
    2048
}

fn default_chunk_chars() -> usize {
    1800
}

fn default_chunk_delay_ms() -> u64 {
    1000
}

fn default_message_chars() -> usize {
    1000
}

impl RelayConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: RelayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.summary.snapshot_interval == 0 {
            return Err(RelayError::ConfigError(
                "summary.snapshot_interval must be at least 1".into(),
            ));
        }
        if self.summary.chunk_chars == 0 {
            return Err(RelayError::ConfigError(
                "summary.chunk_chars must be at least 1".into(),
            ));
        }
        if self.summary.reporting_channel.0 == 0 {
            return Err(RelayError::ConfigError(
                "summary.reporting_channel is not set".into(),
            ));
        }
        if self.model.endpoint.trim().is_empty() {
            return Err(RelayError::ConfigError("model.endpoint is empty".into()));
        }
        Ok(())
    }

    /// Bot token, preferring the environment over the file.
    pub fn discord_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .or_else(|| self.bot.discord_token.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

pub fn load_config(path: &Path) -> Result<RelayConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RelayError::ConfigError(format!("Failed to read config {}: {e}", path.display()))
    })?;
    RelayConfig::parse(&content).map_err(|e| {
        RelayError::ConfigError(format!("Failed to parse config {}: {e}", path.display()))
    })
}
