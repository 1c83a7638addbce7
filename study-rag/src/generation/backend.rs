//! Completion backend trait and its raw failure type.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A raw failure reported by a completion backend, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendFailure {
    /// The backend could not be reached at all.
    Connect(String),
    /// The request did not complete within its timeout.
    Timeout,
    /// The backend answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Error text reported by the backend.
        message: String,
    },
    /// The backend answered successfully but the body was not understood.
    Malformed(String),
    /// Any other transport failure.
    Other(String),
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(message) => write!(f, "connection failed: {message}"),
            Self::Timeout => f.write_str("request timed out"),
            Self::Status { status, message } => write!(f, "backend returned status {status}: {message}"),
            Self::Malformed(message) => write!(f, "unexpected response: {message}"),
            Self::Other(message) => f.write_str(message),
        }
    }
}

/// A model installed in the backend's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model tag, e.g. `llama3.2:1b`.
    pub name: String,
    /// Size on disk in bytes.
    pub size: u64,
    /// Last modification timestamp as reported by the backend.
    pub modified: String,
}

/// A text-completion service.
///
/// One call is one non-streaming completion of `prompt` by `model`.
/// Implementations must bound each call with a timeout and report it as
/// [`BackendFailure::Timeout`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Complete `prompt` with `model`.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String, BackendFailure>;

    /// List the models installed in the backend.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendFailure>;

    /// Short backend name used in logs.
    fn name(&self) -> &str;
}
