//! RAG pipeline composition root.
//!
//! The [`Pipeline`] wires chunking and storage on ingest, and retrieval,
//! prompt assembly and generation on ask. It owns the collection handle for
//! the lifetime of the process.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use study_rag::{Pipeline, RagConfig, GenerationConfig, InMemorySimilarityIndex};
//!
//! let pipeline = Pipeline::builder()
//!     .config(RagConfig::default())
//!     .generation(GenerationConfig::default())
//!     .index(Arc::new(InMemorySimilarityIndex::new(embedder)))
//!     .backend(Arc::new(OllamaBackend::from_config(&GenerationConfig::default())?))
//!     .build()
//!     .await?;
//!
//! pipeline.ingest("notes.pdf", &text).await?;
//! let answer = pipeline.ask("What is osmosis?").await?;
//! ```

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::{GenerationConfig, RagConfig};
use crate::document::{Answer, Document, IngestReport};
use crate::error::{RagError, Result};
use crate::generation::{BackendFailure, CompletionBackend, GenerationClient, HealthReport, ModelInfo};
use crate::index::SimilarityIndex;
use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;
use crate::store::{CollectionHandle, DocumentStore};

/// The question-answering pipeline.
///
/// Construct one via [`Pipeline::builder()`] and share it behind an `Arc`.
/// Ingest and retrieval run concurrently; a reset waits for them and blocks
/// new ones until the collection has been recreated. Generation happens
/// outside that gate, so a slow model never holds up a reset.
pub struct Pipeline {
    config: RagConfig,
    generation: GenerationConfig,
    chunker: Arc<dyn Chunker>,
    store: Arc<DocumentStore>,
    collection: CollectionHandle,
    retriever: Retriever,
    prompts: PromptAssembler,
    generator: GenerationClient,
    gate: RwLock<()>,
}

impl Pipeline {
    /// Create a new [`PipelineBuilder`].
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the generation configuration.
    pub fn generation_config(&self) -> &GenerationConfig {
        &self.generation
    }

    /// The collection all documents are stored in.
    pub fn collection(&self) -> &CollectionHandle {
        &self.collection
    }

    /// Chunk a document's text and store the chunks.
    ///
    /// Whitespace-only text stores nothing and reports zero chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreWrite`] if the chunks could not be written.
    pub async fn ingest(&self, document_name: &str, text: &str) -> Result<IngestReport> {
        self.ingest_document(&Document::new(document_name, text)).await
    }

    /// Chunk and store a [`Document`].
    pub async fn ingest_document(&self, document: &Document) -> Result<IngestReport> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(document = %document.name, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestReport { document_name: document.name.clone(), chunk_count: 0 });
        }

        {
            let _shared = self.gate.read().await;
            self.store.add(&self.collection, &chunks).await?;
        }

        let chunk_count = chunks.len();
        info!(document = %document.name, chunk_count, "ingested document");
        Ok(IngestReport { document_name: document.name.clone(), chunk_count })
    }

    /// Answer a question from the stored documents.
    ///
    /// Generation failures do not fail the call: they come back as an
    /// [`Answer`] whose text is a diagnostic with remediation steps and whose
    /// sources are empty.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreQuery`] if the similarity index fails.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let passages = {
            let _shared = self.gate.read().await;
            self.retriever.retrieve(question, self.config.top_k).await?
        };

        let prompt = self.prompts.build(&passages, question);
        let sources = passages.iter().map(|p| p.source_ref()).collect();

        match self
            .generator
            .generate(&prompt, &self.generation.primary_model, &self.generation.fallback_models)
            .await
        {
            Ok(generation) => {
                info!(model = %generation.model, attempts = generation.attempts, passage_count = passages.len(), "answered question");
                Ok(Answer::generated(generation.text, sources))
            }
            Err(e) => {
                warn!(error = %e, "generation failed, returning diagnostic");
                Ok(Answer::diagnostic(e.user_message()))
            }
        }
    }

    /// Remove every stored document.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreFatal`] if the collection could not be
    /// recreated, or [`RagError::StoreWrite`] if it could not be deleted.
    pub async fn reset(&self) -> Result<()> {
        let _exclusive = self.gate.write().await;
        self.store.reset(self.collection.name()).await?;
        Ok(())
    }

    /// Number of chunks currently stored.
    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.count(&self.collection).await
    }

    /// Models installed in the generation backend.
    pub async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, BackendFailure> {
        self.generator.list_models().await
    }

    /// Health of the generation backend.
    pub async fn health(&self) -> HealthReport {
        self.generator.health(&self.generation.primary_model).await
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// `index` and `backend` are required. The chunker defaults to a
/// [`FixedSizeChunker`] built from the [`RagConfig`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<RagConfig>,
    generation: Option<GenerationConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    index: Option<Arc<dyn SimilarityIndex>>,
    backend: Option<Arc<dyn CompletionBackend>>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the generation configuration.
    pub fn generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the similarity index.
    pub fn index(mut self, index: Arc<dyn SimilarityIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the completion backend.
    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the [`Pipeline`], creating or fetching its collection.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if a required part is missing or
    /// the chunking parameters are invalid, and [`RagError::StoreFatal`] if
    /// the collection cannot be created.
    pub async fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        let generation = self.generation.unwrap_or_default();
        let index =
            self.index.ok_or_else(|| RagError::InvalidConfig("index is required".to_string()))?;
        let backend =
            self.backend.ok_or_else(|| RagError::InvalidConfig("backend is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::from_config(&config)?),
        };

        let store = Arc::new(DocumentStore::new(index, config.reset));
        let collection = store.ensure_collection(&config.collection).await?;
        let retriever = Retriever::new(store.clone(), collection.clone());
        info!(collection = %collection, primary_model = %generation.primary_model, "pipeline ready");

        Ok(Pipeline {
            config,
            generation,
            chunker,
            store,
            collection,
            retriever,
            prompts: PromptAssembler,
            generator: GenerationClient::new(backend),
            gate: RwLock::new(()),
        })
    }
}
