//! Answer generation with ordered model fallback.
//!
//! A [`GenerationClient`] tries `[primary] + fallbacks` in order against a
//! [`CompletionBackend`]. Every failed attempt goes through [`classify`],
//! which decides whether the next candidate is worth trying:
//!
//! | Failure | Kind | Next candidate? |
//! |---------|------|-----------------|
//! | connection refused | `BackendUnreachable` | no |
//! | request timed out | `Timeout` | yes |
//! | out of memory / buffer allocation | `ResourceExhausted` | yes |
//! | model not installed | `ModelNotFound` | yes |
//! | anything else | `Unknown` | yes |
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use study_rag::generation::{GenerationClient, OllamaBackend};
//!
//! let backend = OllamaBackend::from_config(&GenerationConfig::default())?;
//! let client = GenerationClient::new(Arc::new(backend));
//! let generation = client.generate(&prompt, "llama3.2:1b", &["tinyllama".into()]).await?;
//! ```

mod backend;
mod classify;
mod client;
mod ollama;

pub use backend::{BackendFailure, CompletionBackend, ModelInfo};
pub use classify::{ClassifiedFailure, FailureKind, Severity, classify};
pub use client::{
    AttemptOutcome, Generation, GenerationClient, GenerationError, HealthReport, Remediation,
    candidate_models,
};
pub use ollama::OllamaBackend;
