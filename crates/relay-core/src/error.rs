use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("Plugin start error: {0}")]
    PluginStartError(String),

    #[error("Dependency resolution error: {0}")]
    DependencyError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Chat platform error: {0}")]
    PlatformError(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
