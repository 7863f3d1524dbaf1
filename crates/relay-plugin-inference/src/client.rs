use std::time::Duration;

use async_trait::async_trait;
use relay_core::{ModelConfig, RelayError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Body posted to a llama.cpp style `/completion` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub n_predict: u32,
    pub temperature: f64,
    pub stop: Vec<String>,
    pub repeat_penalty: f64,
    pub tokens_cached: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

/// One attempt at generating text. Retrying is the caller's business.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Clone)]
pub struct InferenceService {
    client: Client,
    endpoint: String,
}

impl InferenceService {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::InferenceError(format!("HTTP client setup: {e}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionBackend for InferenceService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        tracing::debug!(
            n_predict = request.n_predict,
            prompt_chars = request.prompt.len(),
            "Inference request"
        );
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::InferenceError(format!("HTTP error: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::InferenceError(format!(
                "API error {status}: {body}"
            )));
        }
        let data: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::InferenceError(format!("Parse error: {e}")))?;
        Ok(data.content)
    }
}
