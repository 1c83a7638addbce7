//! Error types for the `study-rag` crate.

use std::fmt;

use thiserror::Error;

/// Why a similarity query could not produce results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFailure {
    /// Nothing has been ingested into the collection yet.
    EmptyCollection,
    /// The similarity index failed or could not be reached.
    Backend(String),
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCollection => f.write_str("collection is empty"),
            Self::Backend(message) => f.write_str(message),
        }
    }
}

/// Errors that can occur in ingestion and retrieval.
#[derive(Debug, Error)]
pub enum RagError {
    /// Chunking or pipeline parameters are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing chunks into the collection failed. Not retried; the caller
    /// should upload the document again.
    #[error("Failed to write to collection '{collection}': {message}")]
    StoreWrite {
        /// The collection that rejected the write.
        collection: String,
        /// A description of the failure.
        message: String,
    },

    /// A similarity query failed.
    #[error("Failed to query collection '{collection}': {reason}")]
    StoreQuery {
        /// The collection that was queried.
        collection: String,
        /// What went wrong.
        reason: QueryFailure,
    },

    /// The collection could not be recreated; nothing can be ingested or
    /// answered until the process is restarted.
    #[error("Collection '{collection}' is unusable after {attempts} attempt(s): {message}")]
    StoreFatal {
        /// The collection that could not be recreated.
        collection: String,
        /// How many create attempts were made.
        attempts: usize,
        /// The last failure reported by the index.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the similarity index backend.
    #[error("Similarity index error ({backend}): {message}")]
    Index {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Uploaded bytes could not be turned into text.
    #[error("Text extraction failed: {0}")]
    Extraction(String),
}

impl RagError {
    /// Returns `true` when a query failed only because nothing is stored yet.
    pub fn is_empty_collection(&self) -> bool {
        matches!(self, Self::StoreQuery { reason: QueryFailure::EmptyCollection, .. })
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
