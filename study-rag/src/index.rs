//! Similarity index trait: the external engine that embeds, stores and
//! searches chunks.

use async_trait::async_trait;

use crate::document::Chunk;
use crate::error::Result;

/// A chunk returned by a similarity query with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// The stored chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// A storage backend that owns embeddings and answers similarity queries.
///
/// Implementations manage named collections. Callers hand over chunk text
/// and metadata; how the text is embedded and indexed is entirely up to the
/// backend.
///
/// # Example
///
/// ```rust,ignore
/// use study_rag::{InMemorySimilarityIndex, SimilarityIndex};
///
/// let index = InMemorySimilarityIndex::new(embedder);
/// index.create_collection("study_docs").await?;
/// index.add("study_docs", &chunks).await?;
/// let hits = index.query("study_docs", "what is osmosis?", 3).await?;
/// ```
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str) -> Result<()>;

    /// Delete a named collection and all its records. No-op if it is missing.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Embed and store chunks. A chunk whose id already exists replaces it.
    async fn add(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Return up to `top_k` chunks most similar to `text`, most relevant first.
    async fn query(&self, collection: &str, text: &str, top_k: usize) -> Result<Vec<IndexHit>>;

    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;
}
