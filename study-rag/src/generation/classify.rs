//! Deterministic classification of backend failures.

use std::fmt;

use super::backend::BackendFailure;

/// Message fragments that signal memory pressure in the backend.
const RESOURCE_PATTERNS: &[&str] =
    &["unable to allocate", "buffer", "out of memory", "insufficient memory"];

/// Message fragments that signal a model that is not installed.
const NOT_FOUND_PATTERNS: &[&str] = &["not found", "try pulling"];

/// What kind of failure a backend error represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request exceeded its timeout.
    Timeout,
    /// The backend process cannot be reached.
    BackendUnreachable,
    /// The requested model is not installed.
    ModelNotFound,
    /// The backend ran out of memory or buffer space.
    ResourceExhausted,
    /// Not matched by any known pattern.
    Unknown,
}

/// Whether another candidate model can still succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Try the next candidate.
    Recoverable,
    /// No candidate can succeed; stop.
    Fatal,
}

impl FailureKind {
    /// Severity of this kind of failure.
    pub fn severity(self) -> Severity {
        match self {
            Self::BackendUnreachable => Severity::Fatal,
            Self::Timeout | Self::ModelNotFound | Self::ResourceExhausted | Self::Unknown => {
                Severity::Recoverable
            }
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timeout",
            Self::BackendUnreachable => "backend unreachable",
            Self::ModelNotFound => "model not found",
            Self::ResourceExhausted => "resource exhausted",
            Self::Unknown => "unknown",
        })
    }
}

/// Map a raw backend failure to its [`FailureKind`].
///
/// Memory patterns are checked before not-found patterns, so an allocation
/// error that happens to mention a missing buffer is still a memory error.
pub fn classify(failure: &BackendFailure) -> FailureKind {
    match failure {
        BackendFailure::Connect(_) => FailureKind::BackendUnreachable,
        BackendFailure::Timeout => FailureKind::Timeout,
        BackendFailure::Status { status, message } => {
            let message = message.to_lowercase();
            if contains_any(&message, RESOURCE_PATTERNS) {
                FailureKind::ResourceExhausted
            } else if *status == 404 || contains_any(&message, NOT_FOUND_PATTERNS) {
                FailureKind::ModelNotFound
            } else {
                FailureKind::Unknown
            }
        }
        BackendFailure::Malformed(_) => FailureKind::Unknown,
        BackendFailure::Other(message) => {
            if contains_any(&message.to_lowercase(), RESOURCE_PATTERNS) {
                FailureKind::ResourceExhausted
            } else {
                FailureKind::Unknown
            }
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// A failed attempt against one candidate model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFailure {
    /// The candidate model.
    pub model: String,
    /// The classified kind.
    pub kind: FailureKind,
    /// Human-readable description of the raw failure.
    pub detail: String,
}

impl ClassifiedFailure {
    /// Classify `failure` for `model`.
    pub fn new(model: impl Into<String>, failure: &BackendFailure) -> Self {
        Self { model: model.into(), kind: classify(failure), detail: failure.to_string() }
    }

    /// Severity of the underlying kind.
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.model, self.kind, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, message: &str) -> BackendFailure {
        BackendFailure::Status { status: code, message: message.to_string() }
    }

    #[test]
    fn connection_failures_are_fatal() {
        let kind = classify(&BackendFailure::Connect("connection refused".into()));
        assert_eq!(kind, FailureKind::BackendUnreachable);
        assert_eq!(kind.severity(), Severity::Fatal);
    }

    #[test]
    fn timeouts_are_recoverable() {
        let kind = classify(&BackendFailure::Timeout);
        assert_eq!(kind, FailureKind::Timeout);
        assert_eq!(kind.severity(), Severity::Recoverable);
    }

    #[test]
    fn memory_messages_are_resource_exhaustion() {
        for message in [
            "unable to allocate CPU buffer",
            "model requires more system memory (out of memory)",
            "failed to create BUFFER",
            "insufficient memory for context",
        ] {
            assert_eq!(classify(&status(500, message)), FailureKind::ResourceExhausted, "{message}");
        }
        assert_eq!(
            classify(&BackendFailure::Other("Unable to allocate".into())),
            FailureKind::ResourceExhausted
        );
    }

    #[test]
    fn missing_models_are_detected_by_status_or_text() {
        assert_eq!(
            classify(&status(404, "model \"phi\" not found, try pulling it first")),
            FailureKind::ModelNotFound
        );
        assert_eq!(classify(&status(404, "")), FailureKind::ModelNotFound);
        assert_eq!(classify(&status(400, "model 'x' not found")), FailureKind::ModelNotFound);
        assert_eq!(FailureKind::ModelNotFound.severity(), Severity::Recoverable);
    }

    #[test]
    fn memory_wins_over_not_found() {
        assert_eq!(
            classify(&status(404, "buffer not found: unable to allocate")),
            FailureKind::ResourceExhausted
        );
    }

    #[test]
    fn everything_else_is_unknown_and_recoverable() {
        assert_eq!(classify(&status(500, "internal server error")), FailureKind::Unknown);
        assert_eq!(classify(&BackendFailure::Malformed("{}".into())), FailureKind::Unknown);
        assert_eq!(classify(&BackendFailure::Other("tls handshake".into())), FailureKind::Unknown);
        assert_eq!(FailureKind::Unknown.severity(), Severity::Recoverable);
    }

    #[test]
    fn classified_failure_keeps_model_and_detail() {
        let failure = ClassifiedFailure::new("tinyllama", &BackendFailure::Timeout);
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(failure.to_string(), "tinyllama (timeout): request timed out");
    }
}
