pub mod discord;
pub mod responder;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    HealthStatus, PluginCategory, PluginDependency, PluginHealth, PluginMeta, RelayError,
    RelayPlugin, Result,
};
use tokio::task::JoinHandle;

pub use discord::{start_discord_bot, DiscordPlatform};
pub use responder::{Responder, ResponderSettings};

pub const PLUGIN_ID: &str = "gateway-discord";

pub struct GatewayDiscordPlugin {
    token: String,
    responder: Arc<Responder>,
    client: Option<JoinHandle<()>>,
}

impl GatewayDiscordPlugin {
    pub fn create(token: String, responder: Arc<Responder>) -> Box<dyn RelayPlugin> {
        Box::new(Self {
            token,
            responder,
            client: None,
        })
    }
}

#[async_trait]
impl RelayPlugin for GatewayDiscordPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta {
            id: PLUGIN_ID.into(),
            name: "Gateway Discord Plugin".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            dependencies: vec![
                PluginDependency::required(relay_plugin_inference::PLUGIN_ID),
                PluginDependency::required(relay_plugin_summary::PLUGIN_ID),
            ],
            category: PluginCategory::Gateway,
        }
    }

    async fn start(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Err(RelayError::PluginStartError(
                "discord client already running".into(),
            ));
        }
        let token = self.token.clone();
        let responder = self.responder.clone();
        self.client = Some(tokio::spawn(async move {
            if let Err(e) = start_discord_bot(token, responder).await {
                tracing::error!("Discord client stopped: {e:#}");
            }
        }));
        tracing::info!("GatewayDiscordPlugin started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.abort();
        }
        tracing::info!("GatewayDiscordPlugin stopped");
        Ok(())
    }

    async fn health(&self) -> PluginHealth {
        let (status, message) = match &self.client {
            Some(client) if client.is_finished() => (HealthStatus::Unhealthy, "client exited"),
            Some(_) => (HealthStatus::Healthy, "OK"),
            None => (HealthStatus::Degraded, "client not running"),
        };
        PluginHealth {
            status,
            message: message.into(),
            metrics: HashMap::new(),
        }
    }
}
