pub mod delivery;
pub mod manager;
pub mod prompt;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    HealthStatus, PluginCategory, PluginDependency, PluginHealth, PluginMeta, RelayPlugin, Result,
};

pub use manager::{ChannelSummaryManager, ChannelSummaryState, SummarySettings};
pub use prompt::{Snapshot, SUPERVISOR_ROLE};

pub const PLUGIN_ID: &str = "summary";

pub struct SummaryPlugin {
    manager: Arc<ChannelSummaryManager>,
}

impl SummaryPlugin {
    pub fn create(manager: Arc<ChannelSummaryManager>) -> Box<dyn RelayPlugin> {
        Box::new(Self { manager })
    }
}

#[async_trait]
impl RelayPlugin for SummaryPlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta {
            id: PLUGIN_ID.into(),
            name: "Channel Summary Plugin".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            dependencies: vec![PluginDependency::required(relay_plugin_inference::PLUGIN_ID)],
            category: PluginCategory::Summary,
        }
    }

    async fn start(&mut self) -> Result<()> {
        tracing::info!("SummaryPlugin started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        tracing::info!(
            channels = self.manager.tracked_channels(),
            "SummaryPlugin stopped"
        );
        Ok(())
    }

    async fn health(&self) -> PluginHealth {
        let mut metrics = HashMap::new();
        metrics.insert(
            "tracked_channels".into(),
            self.manager.tracked_channels().into(),
        );
        PluginHealth {
            status: HealthStatus::Healthy,
            message: "OK".into(),
            metrics,
        }
    }
}
