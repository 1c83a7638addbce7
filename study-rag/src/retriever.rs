//! Top-k retrieval of passages for a question.

use std::sync::Arc;

use tracing::{debug, info};

use crate::document::RetrievedPassage;
use crate::error::Result;
use crate::store::{CollectionHandle, DocumentStore};

/// Default number of passages retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

/// Issues similarity queries and maps raw hits into ranked passages.
pub struct Retriever {
    store: Arc<DocumentStore>,
    collection: CollectionHandle,
}

impl Retriever {
    /// Create a retriever over a collection.
    pub fn new(store: Arc<DocumentStore>, collection: CollectionHandle) -> Self {
        Self { store, collection }
    }

    /// Retrieve up to `top_k` passages for `question`, in backend order.
    ///
    /// An empty collection yields an empty list; only backend failures are
    /// errors.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedPassage>> {
        let hits = match self.store.query(&self.collection, question, top_k).await {
            Ok(hits) => hits,
            Err(e) if e.is_empty_collection() => {
                debug!(collection = %self.collection, "no chunks stored yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let passages: Vec<RetrievedPassage> = hits
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| RetrievedPassage {
                text: hit.text,
                source: hit.metadata.source,
                chunk: hit.metadata.chunk,
                rank,
                score: hit.score,
            })
            .collect();

        info!(collection = %self.collection, passage_count = passages.len(), "retrieved passages");
        Ok(passages)
    }
}
