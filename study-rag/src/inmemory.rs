//! In-memory similarity index using cosine similarity.
//!
//! This module provides [`InMemorySimilarityIndex`], a process-local index
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. Records live
//! as long as the process, which matches an ephemeral vector database.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::Chunk;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{IndexHit, SimilarityIndex};

const BACKEND: &str = "InMemory";

#[derive(Debug, Clone)]
struct Record {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// A collection keeps insertion order so equal scores rank deterministically.
#[derive(Debug, Default)]
struct Collection {
    records: Vec<Record>,
    positions: HashMap<String, usize>,
}

impl Collection {
    fn upsert(&mut self, record: Record) {
        match self.positions.get(&record.chunk.id) {
            Some(&position) => self.records[position] = record,
            None => {
                self.positions.insert(record.chunk.id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }
}

/// An in-memory similarity index that embeds chunks with an
/// [`EmbeddingProvider`] and ranks them by cosine similarity.
///
/// All operations are async-safe via `tokio::sync::RwLock`. Embedding runs
/// before the write lock is taken, so slow providers do not block readers.
pub struct InMemorySimilarityIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemorySimilarityIndex {
    /// Create a new empty index using the given embedding provider.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder, collections: RwLock::new(HashMap::new()) }
    }

    fn missing(collection: &str) -> RagError {
        RagError::Index {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl SimilarityIndex for InMemorySimilarityIndex {
    async fn create_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn add(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if !self.collections.read().await.contains_key(collection) {
            return Err(Self::missing(collection));
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::Index {
                backend: BACKEND.to_string(),
                message: format!(
                    "embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        let mut collections = self.collections.write().await;
        // Re-check: the collection may have been deleted while embedding.
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            store.upsert(Record { chunk: chunk.clone(), embedding });
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.records.len()).ok_or_else(|| Self::missing(collection))
    }

    async fn query(&self, collection: &str, text: &str, top_k: usize) -> Result<Vec<IndexHit>> {
        let query_embedding = self.embedder.embed(text).await?;

        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;

        let mut scored: Vec<IndexHit> = store
            .records
            .iter()
            .map(|record| IndexHit {
                chunk: record.chunk.clone(),
                score: cosine_similarity(&record.embedding, &query_embedding),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
