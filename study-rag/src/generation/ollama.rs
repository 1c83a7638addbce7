//! Ollama completion backend over `/api/generate` and `/api/tags`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::backend::{BackendFailure, CompletionBackend, ModelInfo};
use crate::config::GenerationConfig;
use crate::error::{RagError, Result};

/// Longest backend error body kept in a failure message, in characters.
const MAX_ERROR_BODY: usize = 200;

/// Upper bound on establishing a connection to the daemon.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`CompletionBackend`] talking to a local Ollama daemon.
///
/// Each completion is a single non-streaming request bounded by
/// `request_timeout`; registry lookups use the shorter `registry_timeout`.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    registry_timeout: Duration,
}

impl OllamaBackend {
    /// Create a backend for the daemon at `base_url`.
    pub fn new(base_url: &str, request_timeout: Duration, registry_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).build().map_err(|e| {
            RagError::InvalidConfig(format!("failed to build HTTP client for Ollama: {e}"))
        })?;
        Ok(Self::with_client(client, base_url, request_timeout, registry_timeout))
    }

    /// Create a backend from the generation configuration.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout(), config.registry_timeout())
    }

    /// Create a backend sharing an existing HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        request_timeout: Duration,
        registry_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            registry_timeout,
        }
    }

    /// Base URL of the daemon.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_failure(e: reqwest::Error) -> BackendFailure {
        transport_failure_kind(e.is_connect(), e.is_timeout(), e.is_decode(), e.to_string())
    }

    /// Turn a non-success response into a failure carrying the backend's message.
    async fn status_failure(response: reqwest::Response) -> BackendFailure {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| body.chars().take(MAX_ERROR_BODY).collect());
        BackendFailure::Status { status, message }
    }
}

/// A connect-phase timeout reports both `is_connect` and `is_timeout`; it
/// means the daemon is unreachable, not that the model is slow.
fn transport_failure_kind(connect: bool, timeout: bool, decode: bool, message: String) -> BackendFailure {
    if connect {
        BackendFailure::Connect(message)
    } else if timeout {
        BackendFailure::Timeout
    } else if decode {
        BackendFailure::Malformed(message)
    } else {
        BackendFailure::Other(message)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    modified_at: String,
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn complete(&self, model: &str, prompt: &str) -> std::result::Result<String, BackendFailure> {
        debug!(backend = "Ollama", model, prompt_len = prompt.len(), "POST /api/generate");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.request_timeout)
            .json(&GenerateRequest { model, prompt, stream: false })
            .send()
            .await
            .map_err(Self::transport_failure)?;

        if !response.status().is_success() {
            return Err(Self::status_failure(response).await);
        }

        let body: Value = response.json().await.map_err(Self::transport_failure)?;
        match body.get("response").and_then(Value::as_str) {
            Some(text) => Ok(text.to_string()),
            None => {
                let rendered: String = body.to_string().chars().take(MAX_ERROR_BODY).collect();
                Err(BackendFailure::Malformed(format!("unexpected Ollama response format: {rendered}")))
            }
        }
    }

    async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, BackendFailure> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.registry_timeout)
            .send()
            .await
            .map_err(Self::transport_failure)?;

        if !response.status().is_success() {
            return Err(Self::status_failure(response).await);
        }

        let tags: TagsResponse = response.json().await.map_err(Self::transport_failure)?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo { name: m.name, size: m.size, modified: m.modified_at })
            .collect())
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
