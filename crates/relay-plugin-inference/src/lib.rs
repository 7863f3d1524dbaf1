pub mod backoff;
pub mod client;
pub mod latency;
pub mod scheduler;

use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::{
    HealthStatus, PluginCategory, PluginHealth, PluginMeta, RelayError, RelayPlugin, Result,
};
use tokio::task::JoinHandle;

pub use backoff::BackoffPolicy;
pub use client::{CompletionBackend, CompletionRequest, InferenceService};
pub use latency::RollingLatency;
pub use scheduler::{
    render_prompt, InferenceRequest, InferenceScheduler, Priority, SchedulerHandle,
    SchedulerSettings, FALLBACK_TEXT,
};

pub const PLUGIN_ID: &str = "inference";

/// Owns the scheduler worker task.
pub struct InferencePlugin {
    scheduler: Option<InferenceScheduler>,
    handle: SchedulerHandle,
    worker: Option<JoinHandle<()>>,
}

impl InferencePlugin {
    pub fn create(scheduler: InferenceScheduler) -> Box<dyn RelayPlugin> {
        Box::new(Self {
            handle: scheduler.handle(),
            scheduler: Some(scheduler),
            worker: None,
        })
    }
}

#[async_trait]
impl RelayPlugin for InferencePlugin {
    fn meta(&self) -> PluginMeta {
        PluginMeta {
            id: PLUGIN_ID.into(),
            name: "Inference Plugin".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            dependencies: vec![],
            category: PluginCategory::Inference,
        }
    }

    async fn start(&mut self) -> Result<()> {
        let scheduler = self.scheduler.take().ok_or_else(|| {
            RelayError::PluginStartError("inference worker already started".into())
        })?;
        let (_, worker) = scheduler.spawn();
        self.worker = Some(worker);
        tracing::info!("InferencePlugin started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        tracing::info!(
            pending = self.handle.queue_len(),
            "InferencePlugin stopped"
        );
        Ok(())
    }

    async fn health(&self) -> PluginHealth {
        let mut metrics = HashMap::new();
        metrics.insert("queue_len".into(), self.handle.queue_len().into());
        metrics.insert("completed".into(), self.handle.completed().into());
        metrics.insert(
            "average_latency_secs".into(),
            self.handle.average_latency().as_secs_f64().into(),
        );
        let (status, message) = match &self.worker {
            Some(worker) if worker.is_finished() => (HealthStatus::Unhealthy, "worker exited"),
            Some(_) => (HealthStatus::Healthy, "OK"),
            None => (HealthStatus::Degraded, "worker not running"),
        };
        PluginHealth {
            status,
            message: message.into(),
            metrics,
        }
    }
}
