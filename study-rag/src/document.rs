//! Data types for documents, chunks, passages and answers.

use serde::{Deserialize, Serialize};

/// An uploaded document after text extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Name of the upload, unique within a session.
    pub name: String,
    /// The extracted text content.
    pub text: String,
}

impl Document {
    /// Create a document from a name and its extracted text.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

/// Provenance stored alongside every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Name of the document the chunk was cut from.
    pub source: String,
    /// Position of the chunk within its document.
    pub chunk: usize,
}

/// A contiguous window of a [`Document`]'s text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `<document_name>_<index>`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Source document and index.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Build a chunk for `index` of the named document.
    pub fn new(document_name: &str, index: usize, text: impl Into<String>) -> Self {
        Self {
            id: format!("{document_name}_{index}"),
            text: text.into(),
            metadata: ChunkMetadata { source: document_name.to_string(), chunk: index },
        }
    }
}

/// A ranked match returned by the retriever for one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    /// The chunk text.
    pub text: String,
    /// Name of the source document.
    pub source: String,
    /// Chunk index within the source document.
    pub chunk: usize,
    /// Position in the similarity ordering, starting at 0.
    pub rank: usize,
    /// Similarity score reported by the index (higher is more relevant).
    pub score: f32,
}

impl RetrievedPassage {
    /// The provenance of this passage as exposed to callers.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef { source: self.source.clone(), chunk: self.chunk }
    }
}

/// Provenance entry in an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Name of the source document.
    pub source: String,
    /// Chunk index within the source document.
    pub chunk: usize,
}

/// How the answer text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The text came from the language model.
    Generated,
    /// Generation failed and the text is a human-readable diagnostic.
    Diagnostic,
}

/// Result of one question.
///
/// Both generated answers and generation diagnostics use this shape so the
/// caller always gets a renderable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    /// The answer, or a diagnostic with remediation steps.
    #[serde(rename = "answer")]
    pub text: String,
    /// Passages the answer was grounded on.
    pub sources: Vec<SourceRef>,
    /// Whether the text came from the model or is a diagnostic.
    #[serde(skip)]
    pub outcome: AnswerOutcome,
}

impl Answer {
    /// An answer produced by the model from the given sources.
    pub fn generated(text: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self { text: text.into(), sources, outcome: AnswerOutcome::Generated }
    }

    /// A diagnostic returned in place of an answer.
    pub fn diagnostic(text: impl Into<String>) -> Self {
        Self { text: text.into(), sources: Vec::new(), outcome: AnswerOutcome::Diagnostic }
    }

    /// Returns `true` if the text is a diagnostic rather than a model answer.
    pub fn is_diagnostic(&self) -> bool {
        self.outcome == AnswerOutcome::Diagnostic
    }
}

/// Summary of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// The name the document was stored under.
    pub document_name: String,
    /// Number of chunks written.
    pub chunk_count: usize,
}
