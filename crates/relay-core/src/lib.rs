pub mod chat;
pub mod config;
pub mod error;
pub mod plugin_loader;
pub mod plugin_trait;
pub mod text;
pub mod types;

pub use chat::ChatPlatform;
pub use config::{load_config, BotConfig, ModelConfig, RelayConfig, SummaryConfig};
pub use error::{RelayError, Result};
pub use plugin_loader::PluginLoader;
pub use plugin_trait::{
    HealthStatus, PluginCategory, PluginDependency, PluginHealth, PluginMeta, RelayPlugin,
};
pub use types::{ChannelId, HistoryMessage, IncomingMessage, MessageRef};
