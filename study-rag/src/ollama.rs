//! Ollama embedding provider using the local `/api/embeddings` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default embedding model, a MiniLM sentence encoder.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// An [`EmbeddingProvider`] backed by a local Ollama daemon.
///
/// # Example
///
/// ```rust,ignore
/// use study_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("http://localhost:11434", "all-minilm")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `model` served at `base_url`.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(RagError::Embedding {
                provider: "Ollama".into(),
                message: "model name must not be empty".into(),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| RagError::Embedding {
                provider: "Ollama".into(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(client, base_url, model))
    }

    /// Create a provider sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: &str, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/embeddings", base_url.trim_end_matches('/')),
            model: model.into(),
        }
    }

    /// The embedding model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "Ollama", model = %self.model, text_len = text.len(), "embedding text");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbeddingRequest { model: &self.model, prompt: text })
            .send()
            .await
            .map_err(|e| {
                error!(provider = "Ollama", error = %e, "embedding request failed");
                RagError::Embedding {
                    provider: "Ollama".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);

            error!(provider = "Ollama", %status, "embedding API error");
            return Err(RagError::Embedding {
                provider: "Ollama".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = "Ollama", error = %e, "failed to parse embedding response");
            RagError::Embedding {
                provider: "Ollama".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        if parsed.embedding.is_empty() {
            return Err(RagError::Embedding {
                provider: "Ollama".into(),
                message: format!("model '{}' returned an empty embedding", self.model),
            });
        }
        Ok(parsed.embedding)
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
