//! # study-rag
//!
//! Retrieval-augmented question answering over uploaded study documents.
//!
//! Documents are split into overlapping character windows, stored in a
//! similarity index, and the closest passages are handed to a local Ollama
//! model as context. When a model fails, the next candidate in an ordered
//! fallback list is tried; failures are classified so the caller gets an
//! actionable diagnostic instead of a raw error.
//!
//! ## Building blocks
//!
//! - [`FixedSizeChunker`] splits text into windows of `chunk_size` characters.
//! - [`SimilarityIndex`] is the text-in, text-out index seam, with
//!   [`InMemorySimilarityIndex`] as the bundled implementation.
//! - [`DocumentStore`] owns collection lifecycle and error mapping.
//! - [`Retriever`] and [`PromptAssembler`] produce the prompt.
//! - [`GenerationClient`] runs the fallback loop over a [`CompletionBackend`].
//! - [`Pipeline`] ties it all together.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use study_rag::*;
//!
//! let embedder = Arc::new(OllamaEmbeddingProvider::new(DEFAULT_OLLAMA_URL, DEFAULT_EMBEDDING_MODEL)?);
//! let generation = GenerationConfig::default();
//! let pipeline = Pipeline::builder()
//!     .index(Arc::new(InMemorySimilarityIndex::new(embedder)))
//!     .backend(Arc::new(OllamaBackend::from_config(&generation)?))
//!     .generation(generation)
//!     .build()
//!     .await?;
//!
//! pipeline.ingest("biology.txt", "Osmosis is the movement of water...").await?;
//! let answer = pipeline.ask("What is osmosis?").await?;
//! println!("{}", answer.text);
//! ```
//!
//! ## Features
//!
//! - `pdf`: enables [`extract::PdfTextExtractor`] for PDF uploads.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod inmemory;
pub mod ollama;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod store;

pub use chunking::{Chunker, FixedSizeChunker, split_text};
pub use config::{
    DEFAULT_COLLECTION, DEFAULT_FALLBACK_MODELS, DEFAULT_MODEL, DEFAULT_OLLAMA_URL,
    GenerationConfig, RagConfig, RagConfigBuilder, ResetPolicy,
};
pub use document::{
    Answer, AnswerOutcome, Chunk, ChunkMetadata, Document, IngestReport, RetrievedPassage,
    SourceRef,
};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{QueryFailure, RagError, Result};
pub use extract::{PlainTextExtractor, TextExtractor, extractor_for};
pub use generation::{
    BackendFailure, CompletionBackend, FailureKind, GenerationClient, GenerationError,
    HealthReport, ModelInfo, OllamaBackend, Remediation, Severity,
};
pub use index::{IndexHit, SimilarityIndex};
pub use inmemory::InMemorySimilarityIndex;
pub use ollama::{DEFAULT_EMBEDDING_MODEL, OllamaEmbeddingProvider};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use prompt::PromptAssembler;
pub use retriever::{DEFAULT_TOP_K, Retriever};
pub use store::{CollectionHandle, DocumentStore, StoreHit};
