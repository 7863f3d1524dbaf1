use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use relay_core::text::{fill_template, strip_mentions};
use relay_core::{BotConfig, ModelConfig};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::client::{CompletionBackend, CompletionRequest};
use crate::latency::RollingLatency;

pub const FALLBACK_TEXT: &str = "My AI model is not responding, try again in a moment 🔥🐳";

/// Supervisory work is served before anything Normal that is waiting with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Supervisory,
    Normal,
}

pub type OnComplete = Box<dyn FnOnce(String) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

pub struct InferenceRequest {
    pub prompt: String,
    pub priority: Priority,
    /// Substituted for `{user}` in the prompt template.
    pub role: String,
    pub max_output_tokens: Option<u32>,
    on_complete: OnComplete,
}

impl InferenceRequest {
    pub fn new<F, Fut>(prompt: impl Into<String>, on_complete: F) -> Self
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            prompt: prompt.into(),
            priority: Priority::Normal,
            role: "user".into(),
            max_output_tokens: None,
            on_complete: Box::new(move |output| on_complete(output).boxed()),
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }
}

impl std::fmt::Debug for InferenceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceRequest")
            .field("priority", &self.priority)
            .field("role", &self.role)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("prompt_chars", &self.prompt.len())
            .finish()
    }
}

struct QueuedJob {
    seq: u64,
    submitted_at: Instant,
    request: InferenceRequest,
}

impl QueuedJob {
    fn key(&self) -> (Priority, u64) {
        (self.request.priority, self.seq)
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    // BinaryHeap pops the greatest element; the smallest key must come out first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.key().cmp(&self.key())
    }
}

/// Everything the worker needs to turn a request into an endpoint payload.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Template with `{system}`, `{prompt}` and `{user}` placeholders.
    pub prompt_format: String,
    pub system: String,
    pub default_tokens: u32,
    pub temperature: f64,
    pub stop: Vec<String>,
    pub repeat_penalty: f64,
    pub backoff: BackoffPolicy,
    pub fallback: String,
    pub default_latency: Duration,
}

impl SchedulerSettings {
    pub fn from_config(model: &ModelConfig, bot: &BotConfig) -> Self {
        Self {
            prompt_format: model.prompt_format.clone(),
            system: bot.identity.clone(),
            default_tokens: bot.tokens,
            temperature: bot.temperature,
            stop: model.stop.clone(),
            repeat_penalty: model.repeat_penalty,
            backoff: BackoffPolicy::default(),
            fallback: FALLBACK_TEXT.to_string(),
            default_latency: crate::latency::DEFAULT_AVERAGE,
        }
    }
}

/// Fills the model template. Only mention tokens are removed from `prompt`;
/// every other byte of it, placeholder-looking text included, is kept.
pub fn render_prompt(template: &str, system: &str, prompt: &str, user: &str) -> String {
    let prompt = strip_mentions(prompt);
    fill_template(
        template,
        &[("system", system), ("prompt", prompt.as_str()), ("user", user)],
    )
}

struct Shared {
    queue: Mutex<BinaryHeap<QueuedJob>>,
    notify: Notify,
    seq: AtomicU64,
    latency: RollingLatency,
}

/// Cheap, cloneable submission side of the scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Queues `request` and returns at once.
    pub fn submit(&self, request: InferenceRequest) {
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed);
        debug!(seq, ?request, "Queued inference request");
        let job = QueuedJob {
            seq,
            submitted_at: Instant::now(),
            request,
        };
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(job);
        self.shared.notify.notify_one();
    }

    pub fn average_latency(&self) -> Duration {
        self.shared.latency.average()
    }

    pub fn queue_len(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn completed(&self) -> u64 {
        self.shared.latency.count()
    }
}

/// Single worker that feeds queued requests to one endpoint, one at a time.
pub struct InferenceScheduler {
    shared: Arc<Shared>,
    backend: Arc<dyn CompletionBackend>,
    settings: SchedulerSettings,
}

impl InferenceScheduler {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: SchedulerSettings) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            latency: RollingLatency::new(settings.default_latency),
        });
        Self {
            shared,
            backend,
            settings,
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: self.shared.clone(),
        }
    }

    /// Moves the worker onto its own task.
    pub fn spawn(self) -> (SchedulerHandle, JoinHandle<()>) {
        let handle = self.handle();
        let worker = tokio::spawn(self.run());
        (handle, worker)
    }

    pub async fn run(self) {
        info!("Inference worker running");
        loop {
            let job = self.next_job().await;
            self.process(job).await;
        }
    }

    async fn next_job(&self) -> QueuedJob {
        loop {
            let popped = self
                .shared
                .queue
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop();
            if let Some(job) = popped {
                return job;
            }
            self.shared.notify.notified().await;
        }
    }

    pub fn build_request(&self, request: &InferenceRequest) -> CompletionRequest {
        CompletionRequest {
            prompt: render_prompt(
                &self.settings.prompt_format,
                &self.settings.system,
                &request.prompt,
                &request.role,
            ),
            n_predict: request
                .max_output_tokens
                .unwrap_or(self.settings.default_tokens),
            temperature: self.settings.temperature,
            stop: self.settings.stop.clone(),
            repeat_penalty: self.settings.repeat_penalty,
            tokens_cached: 0,
        }
    }

    async fn process(&self, job: QueuedJob) {
        let payload = self.build_request(&job.request);
        let output = match self
            .settings
            .backoff
            .retry(|| self.backend.complete(&payload))
            .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(seq = job.seq, "Inference gave up, using fallback text: {e}");
                self.settings.fallback.clone()
            }
        };

        let turnaround = job.submitted_at.elapsed();
        self.shared.latency.record(turnaround);
        info!(
            seq = job.seq,
            priority = ?job.request.priority,
            ?turnaround,
            average = ?self.shared.latency.average(),
            "Inference job finished"
        );

        let on_complete = job.request.on_complete;
        let delivery = AssertUnwindSafe(async move { on_complete(output).await }).catch_unwind();
        match delivery.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(seq = job.seq, "Completion callback failed: {e:#}"),
            Err(_) => error!(seq = job.seq, "Completion callback panicked"),
        }
    }
}
