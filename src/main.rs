use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use relay_core::{load_config, ChatPlatform, PluginLoader};
use relay_plugin_gateway_discord::{DiscordPlatform, GatewayDiscordPlugin, Responder, ResponderSettings};
use relay_plugin_inference::{InferencePlugin, InferenceScheduler, InferenceService, SchedulerSettings};
use relay_plugin_summary::{ChannelSummaryManager, SummaryPlugin, SummarySettings};
use tracing_subscriber::EnvFilter;

/// Chat bot that answers mentions and summarizes channels through a local completion server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "RELAY_CONFIG", default_value = "relay.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();
    tracing::info!("Relay starting...");

    let config = load_config(&args.config)?;
    let token = config.discord_token().with_context(|| {
        format!(
            "no Discord token: set bot.discord_token or {}",
            relay_core::config::TOKEN_ENV
        )
    })?;

    let service = InferenceService::from_config(&config.model)?;
    tracing::info!(endpoint = service.endpoint(), "Inference endpoint configured");
    let scheduler = InferenceScheduler::new(
        Arc::new(service),
        SchedulerSettings::from_config(&config.model, &config.bot),
    );
    let handle = scheduler.handle();

    let platform: Arc<dyn ChatPlatform> = Arc::new(DiscordPlatform::new(&token));
    let summaries = ChannelSummaryManager::new(
        handle.clone(),
        platform.clone(),
        SummarySettings::from_config(&config.summary),
    );
    let responder = Arc::new(Responder::new(
        platform,
        handle,
        summaries.clone(),
        ResponderSettings::from_config(&config.bot),
    ));

    let mut loader = PluginLoader::new();
    loader.register(GatewayDiscordPlugin::create(token, responder));
    loader.register(SummaryPlugin::create(summaries));
    loader.register(InferencePlugin::create(scheduler));
    loader.start_all().await?;
    tracing::info!("Relay initialized. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    for (id, health) in loader.health_all().await {
        tracing::info!(plugin = %id, status = ?health.status, metrics = ?health.metrics, "{}", health.message);
    }
    loader.stop_all().await?;

    Ok(())
}
