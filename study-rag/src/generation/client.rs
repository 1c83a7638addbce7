//! Ordered multi-candidate generation.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::backend::{BackendFailure, CompletionBackend, ModelInfo};
use super::classify::{ClassifiedFailure, FailureKind, Severity};

/// How many installed models a remediation hint lists.
const LISTED_MODELS: usize = 5;

/// Result of one candidate attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The candidate produced text.
    Success(String),
    /// The candidate failed; the next one may still succeed.
    Recoverable(ClassifiedFailure),
    /// The candidate failed in a way no other candidate can avoid.
    Fatal(ClassifiedFailure),
}

impl AttemptOutcome {
    /// Classify the raw result of calling `model`.
    pub fn from_result(model: &str, result: Result<String, BackendFailure>) -> Self {
        match result {
            Ok(text) => Self::Success(text),
            Err(failure) => {
                let classified = ClassifiedFailure::new(model, &failure);
                match classified.severity() {
                    Severity::Recoverable => Self::Recoverable(classified),
                    Severity::Fatal => Self::Fatal(classified),
                }
            }
        }
    }
}

/// Actionable steps shown when every candidate failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Remediation {
    /// Suggestions, most useful first.
    pub steps: Vec<String>,
}

impl Remediation {
    /// Build suggestions from every failed attempt, listing installed models
    /// if known.
    ///
    /// Memory pressure on any attempt outranks the kind of the last one, so
    /// a large model running out of memory is not hidden behind fallbacks
    /// that were simply not installed.
    pub fn for_failures(failures: &[ClassifiedFailure], installed: &[String]) -> Self {
        let mut steps = vec![
            "Restart Ollama: close it and run 'ollama serve' again".to_string(),
            "Free up RAM: close other applications".to_string(),
        ];
        let memory_pressure = failures.iter().any(|f| f.kind == FailureKind::ResourceExhausted);
        if memory_pressure {
            steps.push("Try a smaller model: run 'ollama pull tinyllama'".to_string());
        } else if let Some(last) = failures.last().filter(|f| f.kind == FailureKind::ModelNotFound) {
            steps.push(format!("Install the model: run 'ollama pull {}'", last.model));
        }
        if !installed.is_empty() {
            let listed: Vec<&str> = installed.iter().take(LISTED_MODELS).map(String::as_str).collect();
            steps.push(format!("Available models: {}", listed.join(", ")));
        } else if !memory_pressure {
            steps.push("Install a smaller model: run 'ollama pull tinyllama'".to_string());
        }
        Self { steps }
    }
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Try:")?;
        for (i, step) in self.steps.iter().enumerate() {
            write!(f, "\n{}. {step}", i + 1)?;
        }
        Ok(())
    }
}

/// Errors returned by [`GenerationClient::generate`].
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The backend process is unreachable; remaining candidates were skipped.
    #[error("Cannot connect to Ollama ({failure}). Is Ollama running? Start it with: ollama serve")]
    BackendUnreachable {
        /// The attempt that detected it.
        failure: ClassifiedFailure,
    },

    /// Every candidate failed recoverably.
    #[error("All models failed. Last error: {last}\n\n{remediation}")]
    AllModelsFailed {
        /// Number of candidates tried.
        attempts: usize,
        /// The last classified failure.
        last: ClassifiedFailure,
        /// Every failed attempt, in candidate order.
        failures: Vec<ClassifiedFailure>,
        /// Suggested fixes.
        remediation: Remediation,
    },

    /// The candidate list was empty.
    #[error("No candidate models configured")]
    NoCandidates,
}

impl GenerationError {
    /// Kind of the failure that ended generation, if any attempt was made.
    ///
    /// When every candidate failed, a memory failure on any attempt wins over
    /// the kind of the last attempt.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::BackendUnreachable { failure } => Some(failure.kind),
            Self::AllModelsFailed { last, failures, .. } => {
                if failures.iter().any(|f| f.kind == FailureKind::ResourceExhausted) {
                    Some(FailureKind::ResourceExhausted)
                } else {
                    Some(last.kind)
                }
            }
            Self::NoCandidates => None,
        }
    }

    /// A message suitable for showing to the user in place of an answer.
    pub fn user_message(&self) -> String {
        if self.kind() == Some(FailureKind::ResourceExhausted) {
            format!(
                "Memory error: {}\n\n\
                 Quick fixes:\n\
                 1. Restart Ollama: close the terminal running 'ollama serve', then run it again\n\
                 2. Free up RAM: close other applications\n\
                 3. Try a smaller model: run 'ollama pull tinyllama' then restart\n\
                 4. Check available models: visit /models",
                self
            )
        } else {
            format!(
                "Error: {}\n\n\
                 Please check:\n\
                 1. Is Ollama running? (run 'ollama serve' in a terminal)\n\
                 2. Is a model installed? (run 'ollama pull llama3.2:1b' or 'ollama pull tinyllama')",
                self
            )
        }
    }
}

/// A successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// The model that answered.
    pub model: String,
    /// The generated text.
    pub text: String,
    /// Number of candidates tried, including the successful one.
    pub attempts: usize,
}

/// Backend status for the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// `healthy` or `unhealthy`.
    pub status: String,
    /// `running`, `responding but error`, `not running` or `error`.
    pub ollama: String,
    /// Installed model names, when the registry answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    /// The model tried first when answering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Whether an installed model name contains the default model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_available: Option<bool>,
    /// Installed models small enough for low-memory machines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_small_models: Option<Vec<String>>,
    /// Why the backend is unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    fn unhealthy(ollama: &str, error: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            ollama: ollama.to_string(),
            models: None,
            default_model: None,
            model_available: None,
            recommended_small_models: None,
            error: Some(error),
        }
    }
}

/// `[primary] + fallbacks` without duplicates or blank names, in order.
pub fn candidate_models(primary: &str, fallbacks: &[String]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
    for model in std::iter::once(primary).chain(fallbacks.iter().map(String::as_str)) {
        let model = model.trim();
        if !model.is_empty() && !candidates.iter().any(|c| c == model) {
            candidates.push(model.to_string());
        }
    }
    candidates
}

/// Invokes a [`CompletionBackend`] over an ordered list of candidate models.
pub struct GenerationClient {
    backend: Arc<dyn CompletionBackend>,
}

impl GenerationClient {
    /// Create a client over the given backend.
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Generate text for `prompt`, trying `primary` then each fallback.
    ///
    /// Returns on the first success. A fatal failure stops immediately;
    /// recoverable failures move on to the next candidate.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::BackendUnreachable`] on a fatal failure.
    /// - [`GenerationError::AllModelsFailed`] when every candidate failed.
    /// - [`GenerationError::NoCandidates`] when no model name was given.
    pub async fn generate(
        &self,
        prompt: &str,
        primary: &str,
        fallbacks: &[String],
    ) -> Result<Generation, GenerationError> {
        let candidates = candidate_models(primary, fallbacks);
        let mut failures: Vec<ClassifiedFailure> = Vec::new();

        for (index, model) in candidates.iter().enumerate() {
            let attempt = index + 1;
            debug!(backend = self.backend.name(), model = %model, attempt, "requesting completion");

            match AttemptOutcome::from_result(model, self.backend.complete(model, prompt).await) {
                AttemptOutcome::Success(text) => {
                    info!(model = %model, attempt, response_len = text.len(), "generation succeeded");
                    return Ok(Generation { model: model.clone(), text, attempts: attempt });
                }
                AttemptOutcome::Recoverable(failure) => {
                    warn!(model = %model, attempt, kind = %failure.kind, detail = %failure.detail, "candidate failed, trying next");
                    failures.push(failure);
                }
                AttemptOutcome::Fatal(failure) => {
                    error!(model = %model, attempt, kind = %failure.kind, detail = %failure.detail, "backend unreachable, skipping remaining candidates");
                    return Err(GenerationError::BackendUnreachable { failure });
                }
            }
        }

        let Some(last) = failures.last().cloned() else {
            return Err(GenerationError::NoCandidates);
        };

        let installed = match self.backend.list_models().await {
            Ok(models) => models.into_iter().map(|m| m.name).collect(),
            Err(e) => {
                debug!(error = %e, "could not list models for remediation");
                Vec::new()
            }
        };
        let remediation = Remediation::for_failures(&failures, &installed);
        error!(attempts = candidates.len(), last = %last, "all candidate models failed");
        Err(GenerationError::AllModelsFailed {
            attempts: candidates.len(),
            last,
            failures,
            remediation,
        })
    }

    /// Models installed in the backend.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendFailure> {
        self.backend.list_models().await
    }

    /// Query the backend registry and summarise its health.
    pub async fn health(&self, default_model: &str) -> HealthReport {
        match self.backend.list_models().await {
            Ok(models) => {
                let names: Vec<String> = models.into_iter().map(|m| m.name).collect();
                let model_available = names.iter().any(|name| name.contains(default_model));
                let recommended = names
                    .iter()
                    .filter(|name| {
                        let lower = name.to_lowercase();
                        ["tiny", "1b", "phi"].iter().any(|hint| lower.contains(hint))
                    })
                    .cloned()
                    .collect();
                HealthReport {
                    status: "healthy".to_string(),
                    ollama: "running".to_string(),
                    models: Some(names),
                    default_model: Some(default_model.to_string()),
                    model_available: Some(model_available),
                    recommended_small_models: Some(recommended),
                    error: None,
                }
            }
            Err(BackendFailure::Status { status, .. }) => {
                HealthReport::unhealthy("responding but error", format!("Status {status}"))
            }
            Err(BackendFailure::Connect(_)) => HealthReport::unhealthy(
                "not running",
                "Cannot connect to Ollama. Please run 'ollama serve' in terminal.".to_string(),
            ),
            Err(other) => HealthReport::unhealthy("error", other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Replays a scripted result per model and records the call order.
    #[derive(Default)]
    struct ScriptedBackend {
        script: HashMap<String, Result<String, BackendFailure>>,
        models: Option<Vec<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn with(mut self, model: &str, result: Result<&str, BackendFailure>) -> Self {
            self.script.insert(model.to_string(), result.map(str::to_string));
            self
        }

        fn installed(mut self, models: &[&str]) -> Self {
            self.models = Some(models.iter().map(|m| m.to_string()).collect());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, model: &str, _prompt: &str) -> Result<String, BackendFailure> {
            self.calls.lock().unwrap().push(model.to_string());
            self.script.get(model).cloned().unwrap_or_else(|| {
                Err(BackendFailure::Status { status: 404, message: format!("model '{model}' not found") })
            })
        }

        async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendFailure> {
            match &self.models {
                Some(names) => Ok(names
                    .iter()
                    .map(|name| ModelInfo { name: name.clone(), size: 0, modified: String::new() })
                    .collect()),
                None => Err(BackendFailure::Connect("connection refused".into())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn fallbacks(models: &[&str]) -> Vec<String> {
        models.iter().map(|m| m.to_string()).collect()
    }

    fn out_of_memory() -> BackendFailure {
        BackendFailure::Status { status: 500, message: "unable to allocate CPU buffer".into() }
    }

    #[test]
    fn candidates_are_deduplicated_in_order() {
        let candidates =
            candidate_models("llama3.2:1b", &fallbacks(&["llama3.2:1b", "phi", "", "tinyllama", "phi"]));
        assert_eq!(candidates, vec!["llama3.2:1b", "phi", "tinyllama"]);
    }

    #[tokio::test]
    async fn falls_back_in_order_until_success() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("m1", Err(out_of_memory()))
                .with("m2", Err(BackendFailure::Timeout))
                .with("m3", Ok("photosynthesis makes sugar")),
        );
        let client = GenerationClient::new(backend.clone());

        let generation = client.generate("prompt", "m1", &fallbacks(&["m2", "m3"])).await.unwrap();
        assert_eq!(generation.text, "photosynthesis makes sugar");
        assert_eq!(generation.model, "m3");
        assert_eq!(generation.attempts, 3);
        assert_eq!(backend.calls(), vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn first_success_stops_the_loop() {
        let backend = Arc::new(ScriptedBackend::default().with("m1", Ok("done")));
        let client = GenerationClient::new(backend.clone());

        client.generate("prompt", "m1", &fallbacks(&["m2", "m3"])).await.unwrap();
        assert_eq!(backend.calls(), vec!["m1"]);
    }

    #[tokio::test]
    async fn fatal_failure_skips_remaining_candidates() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("m1", Err(BackendFailure::Connect("connection refused".into())))
                .with("m2", Ok("unreachable")),
        );
        let client = GenerationClient::new(backend.clone());

        let err = client.generate("prompt", "m1", &fallbacks(&["m2", "m3"])).await.unwrap_err();
        assert!(matches!(err, GenerationError::BackendUnreachable { .. }));
        assert_eq!(err.kind(), Some(FailureKind::BackendUnreachable));
        assert_eq!(backend.calls(), vec!["m1"]);
        assert!(err.user_message().contains("Is Ollama running?"));
    }

    #[tokio::test]
    async fn exhaustion_reports_last_failure_and_installed_models() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("m1", Err(BackendFailure::Timeout))
                .with("m2", Err(out_of_memory()))
                .installed(&["tinyllama:latest", "phi:latest"]),
        );
        let client = GenerationClient::new(backend.clone());

        let err = client.generate("prompt", "m1", &fallbacks(&["m2"])).await.unwrap_err();
        match &err {
            GenerationError::AllModelsFailed { attempts, last, remediation, .. } => {
                assert_eq!(*attempts, 2);
                assert_eq!(last.model, "m2");
                assert_eq!(last.kind, FailureKind::ResourceExhausted);
                assert!(remediation.steps.iter().any(|s| s.contains("tinyllama:latest, phi:latest")));
                assert!(remediation.steps.iter().any(|s| s.contains("smaller model")));
            }
            other => panic!("unexpected error: {other}"),
        }
        let message = err.user_message();
        assert!(message.starts_with("Memory error:"));
        assert!(message.contains("Quick fixes"));
    }

    #[tokio::test]
    async fn exhaustion_without_registry_suggests_installing() {
        let backend = Arc::new(ScriptedBackend::default());
        let client = GenerationClient::new(backend.clone());

        let err = client.generate("prompt", "missing", &[]).await.unwrap_err();
        let GenerationError::AllModelsFailed { remediation, last, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(last.kind, FailureKind::ModelNotFound);
        assert!(remediation.steps.iter().any(|s| s.contains("ollama pull missing")));
        assert!(remediation.steps.iter().any(|s| s.contains("Install a smaller model")));
        assert!(err.to_string().contains("Try:\n1. Restart Ollama"));
    }

    #[tokio::test]
    async fn memory_failure_on_an_earlier_candidate_is_not_masked() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .with("llama3.2:1b", Err(out_of_memory()))
                .installed(&["llama3.2:1b"]),
        );
        let client = GenerationClient::new(backend.clone());
        let defaults: Vec<String> =
            crate::config::DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect();

        let err = client.generate("prompt", "llama3.2:1b", &defaults).await.unwrap_err();
        let GenerationError::AllModelsFailed { last, failures, remediation, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(last.model, "phi");
        assert_eq!(last.kind, FailureKind::ModelNotFound);
        assert_eq!(failures.len(), 5);
        assert_eq!(failures[0].kind, FailureKind::ResourceExhausted);
        assert!(remediation.steps.iter().any(|s| s.contains("Try a smaller model")));
        assert!(!remediation.steps.iter().any(|s| s.contains("ollama pull phi")));

        assert_eq!(err.kind(), Some(FailureKind::ResourceExhausted));
        let message = err.user_message();
        assert!(message.starts_with("Memory error:"));
        assert!(message.contains("Try a smaller model"));
        assert!(!message.contains("Is a model installed?"));
    }

    #[tokio::test]
    async fn memory_failure_without_registry_suggests_tinyllama_once() {
        let backend = Arc::new(ScriptedBackend::default().with("m1", Err(out_of_memory())));
        let client = GenerationClient::new(backend);

        let err = client.generate("prompt", "m1", &[]).await.unwrap_err();
        let GenerationError::AllModelsFailed { remediation, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        let tinyllama_steps =
            remediation.steps.iter().filter(|s| s.contains("ollama pull tinyllama")).count();
        assert_eq!(tinyllama_steps, 1);
        assert_eq!(remediation.steps.len(), 3);
    }

    #[tokio::test]
    async fn blank_candidates_are_rejected() {
        let client = GenerationClient::new(Arc::new(ScriptedBackend::default()));
        let err = client.generate("prompt", " ", &[]).await.unwrap_err();
        assert!(matches!(err, GenerationError::NoCandidates));
    }

    #[tokio::test]
    async fn health_reports_registry_contents() {
        let backend = ScriptedBackend::default().installed(&["llama3.2:1b", "tinyllama:latest", "mistral:7b"]);
        let report = GenerationClient::new(Arc::new(backend)).health("llama3.2:1b").await;

        assert_eq!(report.status, "healthy");
        assert_eq!(report.ollama, "running");
        assert_eq!(report.model_available, Some(true));
        assert_eq!(
            report.recommended_small_models,
            Some(vec!["llama3.2:1b".to_string(), "tinyllama:latest".to_string()])
        );
    }

    #[tokio::test]
    async fn health_reports_unreachable_backend() {
        let report = GenerationClient::new(Arc::new(ScriptedBackend::default())).health("m").await;
        assert_eq!(report.status, "unhealthy");
        assert_eq!(report.ollama, "not running");
        assert!(report.models.is_none());
    }
}
