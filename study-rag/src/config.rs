//! Configuration for the RAG pipeline and the generation backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Name of the collection that holds every ingested chunk.
pub const DEFAULT_COLLECTION: &str = "study_docs";

/// Default address of the local Ollama daemon.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Model tried first when answering.
pub const DEFAULT_MODEL: &str = "llama3.2:1b";

/// Models tried, in order, when the primary model fails.
pub const DEFAULT_FALLBACK_MODELS: &[&str] =
    &["llama3.2:1b", "llama3.2", "llama3:1b", "tinyllama", "phi"];

/// How `DocumentStore::reset` retries recreating a collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetPolicy {
    /// Upper bound on create attempts after the collection was deleted.
    pub max_attempts: usize,
    /// Delay before attempt `n` is `backoff_ms * n`.
    pub backoff_ms: u64,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_ms: 100 }
    }
}

impl ResetPolicy {
    /// Delay to wait before the given (1-based) retry.
    pub fn delay_before(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64))
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of passages retrieved per question.
    pub top_k: usize,
    /// Collection that stores all chunks.
    pub collection: String,
    /// Retry policy for collection resets.
    pub reset: ResetPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 3,
            collection: DEFAULT_COLLECTION.to_string(),
            reset: ResetPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of passages retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the retry policy used when resetting the collection.
    pub fn reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.config.reset = policy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if:
    /// - `chunk_size` or `chunk_overlap` is zero
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - the collection name is blank
    /// - `reset.max_attempts == 0`
    pub fn build(self) -> Result<RagConfig> {
        crate::chunking::validate_window(self.config.chunk_size, self.config.chunk_overlap)?;
        if self.config.top_k == 0 {
            return Err(RagError::InvalidConfig("top_k must be greater than zero".to_string()));
        }
        if self.config.collection.trim().is_empty() {
            return Err(RagError::InvalidConfig("collection name must not be empty".to_string()));
        }
        if self.config.reset.max_attempts == 0 {
            return Err(RagError::InvalidConfig(
                "reset.max_attempts must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}

/// Settings for the generation backend and the model fallback order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Base URL of the Ollama daemon.
    pub base_url: String,
    /// Model tried first.
    pub primary_model: String,
    /// Models tried after the primary one, in order.
    pub fallback_models: Vec<String>,
    /// Upper bound on a single completion request.
    pub request_timeout_secs: u64,
    /// Upper bound on model registry lookups.
    pub registry_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            primary_model: DEFAULT_MODEL.to_string(),
            fallback_models: DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
            request_timeout_secs: 90,
            registry_timeout_secs: 5,
        }
    }
}

impl GenerationConfig {
    /// Timeout applied to each completion request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeout applied to model registry lookups.
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }
}
