//! Document store: the collection-level adapter over a [`SimilarityIndex`].
//!
//! The store maps index failures onto the ingestion/query error kinds the
//! rest of the pipeline reasons about, and makes collection resets
//! all-or-nothing from the caller's point of view.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::ResetPolicy;
use crate::document::{Chunk, ChunkMetadata};
use crate::error::{QueryFailure, RagError, Result};
use crate::index::SimilarityIndex;

/// Handle to a collection that is known to exist.
///
/// Handles are cheap to clone and stay valid across resets, which recreate
/// the collection under the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionHandle {
    name: Arc<str>,
}

impl CollectionHandle {
    /// The collection name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CollectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A raw similarity match in backend order.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    /// The chunk text.
    pub text: String,
    /// Provenance of the chunk.
    pub metadata: ChunkMetadata,
    /// Similarity score reported by the backend.
    pub score: f32,
}

/// Add/query/reset operations on named collections.
pub struct DocumentStore {
    index: Arc<dyn SimilarityIndex>,
    reset_policy: ResetPolicy,
}

impl DocumentStore {
    /// Create a store over the given index.
    pub fn new(index: Arc<dyn SimilarityIndex>, reset_policy: ResetPolicy) -> Self {
        Self { index, reset_policy }
    }

    /// Get or create a collection. Succeeds if it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreFatal`] if the index cannot create it.
    pub async fn ensure_collection(&self, name: &str) -> Result<CollectionHandle> {
        self.index.create_collection(name).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
            RagError::StoreFatal {
                collection: name.to_string(),
                attempts: 1,
                message: e.to_string(),
            }
        })?;
        debug!(collection = name, backend = self.index.name(), "collection ready");
        Ok(CollectionHandle { name: Arc::from(name) })
    }

    /// Write chunks into the collection.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreWrite`] on any backend failure. Nothing is
    /// retried here.
    pub async fn add(&self, handle: &CollectionHandle, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.index.add(handle.name(), chunks).await.map_err(|e| {
            error!(collection = %handle, chunk_count = chunks.len(), error = %e, "store write failed");
            RagError::StoreWrite { collection: handle.name().to_string(), message: e.to_string() }
        })?;
        debug!(collection = %handle, chunk_count = chunks.len(), "stored chunks");
        Ok(())
    }

    /// Number of chunks currently stored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreQuery`] if the backend fails.
    pub async fn count(&self, handle: &CollectionHandle) -> Result<usize> {
        self.index.count(handle.name()).await.map_err(|e| RagError::StoreQuery {
            collection: handle.name().to_string(),
            reason: QueryFailure::Backend(e.to_string()),
        })
    }

    /// Similarity search, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreQuery`] with [`QueryFailure::EmptyCollection`]
    /// when nothing is stored, or [`QueryFailure::Backend`] when the index
    /// fails. Returns [`RagError::InvalidConfig`] if `top_k` is zero.
    pub async fn query(
        &self,
        handle: &CollectionHandle,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<StoreHit>> {
        if top_k == 0 {
            return Err(RagError::InvalidConfig("top_k must be greater than zero".to_string()));
        }

        if self.count(handle).await? == 0 {
            return Err(RagError::StoreQuery {
                collection: handle.name().to_string(),
                reason: QueryFailure::EmptyCollection,
            });
        }

        let hits = self.index.query(handle.name(), question, top_k).await.map_err(|e| {
            error!(collection = %handle, error = %e, "similarity query failed");
            RagError::StoreQuery {
                collection: handle.name().to_string(),
                reason: QueryFailure::Backend(e.to_string()),
            }
        })?;

        Ok(hits
            .into_iter()
            .map(|hit| StoreHit { text: hit.chunk.text, metadata: hit.chunk.metadata, score: hit.score })
            .collect())
    }

    /// Delete and recreate a collection, leaving it empty.
    ///
    /// The create step is retried according to the [`ResetPolicy`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StoreWrite`] if the delete fails (the collection
    /// is left as it was), or [`RagError::StoreFatal`] if it could not be
    /// recreated within the attempt budget.
    pub async fn reset(&self, name: &str) -> Result<CollectionHandle> {
        self.index.delete_collection(name).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to delete collection");
            RagError::StoreWrite { collection: name.to_string(), message: e.to_string() }
        })?;

        let max_attempts = self.reset_policy.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            match self.index.create_collection(name).await {
                Ok(()) => {
                    info!(collection = name, attempt, "collection reset");
                    return Ok(CollectionHandle { name: Arc::from(name) });
                }
                Err(e) => {
                    warn!(collection = name, attempt, max_attempts, error = %e, "recreating collection failed");
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(self.reset_policy.delay_before(attempt)).await;
                    }
                }
            }
        }

        error!(collection = name, attempts = max_attempts, "collection could not be recreated");
        Err(RagError::StoreFatal {
            collection: name.to_string(),
            attempts: max_attempts,
            message: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::embedding::HashEmbeddingProvider;
    use crate::index::IndexHit;
    use crate::inmemory::InMemorySimilarityIndex;

    fn in_memory() -> Arc<InMemorySimilarityIndex> {
        Arc::new(InMemorySimilarityIndex::new(Arc::new(HashEmbeddingProvider::default())))
    }

    fn quick_policy(max_attempts: usize) -> ResetPolicy {
        ResetPolicy { max_attempts, backoff_ms: 1 }
    }

    /// Fails the first `create_failures` create calls, then delegates.
    struct FlakyIndex {
        inner: Arc<InMemorySimilarityIndex>,
        create_failures: usize,
        create_calls: AtomicUsize,
        fail_writes: bool,
        fail_deletes: bool,
    }

    #[async_trait]
    impl SimilarityIndex for FlakyIndex {
        async fn create_collection(&self, name: &str) -> Result<()> {
            let call = self.create_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.create_failures {
                return Err(RagError::Index { backend: "flaky".into(), message: "busy".into() });
            }
            self.inner.create_collection(name).await
        }

        async fn delete_collection(&self, name: &str) -> Result<()> {
            if self.fail_deletes {
                return Err(RagError::Index { backend: "flaky".into(), message: "locked".into() });
            }
            self.inner.delete_collection(name).await
        }

        async fn add(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
            if self.fail_writes {
                return Err(RagError::Index { backend: "flaky".into(), message: "disk full".into() });
            }
            self.inner.add(collection, chunks).await
        }

        async fn count(&self, collection: &str) -> Result<usize> {
            self.inner.count(collection).await
        }

        async fn query(&self, collection: &str, text: &str, top_k: usize) -> Result<Vec<IndexHit>> {
            self.inner.query(collection, text, top_k).await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn flaky(create_failures: usize, fail_writes: bool) -> Arc<FlakyIndex> {
        Arc::new(FlakyIndex {
            inner: in_memory(),
            create_failures,
            create_calls: AtomicUsize::new(0),
            fail_writes,
            fail_deletes: false,
        })
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent() {
        let store = DocumentStore::new(in_memory(), ResetPolicy::default());
        let first = store.ensure_collection("study_docs").await.unwrap();
        store.add(&first, &[Chunk::new("a.txt", 0, "alpha")]).await.unwrap();

        let second = store.ensure_collection("study_docs").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count(&second).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_on_empty_collection_reports_empty() {
        let store = DocumentStore::new(in_memory(), ResetPolicy::default());
        let handle = store.ensure_collection("study_docs").await.unwrap();

        let err = store.query(&handle, "anything", 3).await.unwrap_err();
        assert!(err.is_empty_collection());
    }

    #[tokio::test]
    async fn query_returns_metadata_in_backend_order() {
        let store = DocumentStore::new(in_memory(), ResetPolicy::default());
        let handle = store.ensure_collection("study_docs").await.unwrap();
        store
            .add(
                &handle,
                &[
                    Chunk::new("bio.txt", 0, "cells divide by mitosis"),
                    Chunk::new("bio.txt", 1, "plants use photosynthesis"),
                ],
            )
            .await
            .unwrap();

        let hits = store.query(&handle, "photosynthesis in plants", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata, ChunkMetadata { source: "bio.txt".into(), chunk: 1 });
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn write_failures_surface_as_store_write() {
        let store = DocumentStore::new(flaky(0, true), ResetPolicy::default());
        let handle = store.ensure_collection("study_docs").await.unwrap();

        let err = store.add(&handle, &[Chunk::new("a.txt", 0, "alpha")]).await.unwrap_err();
        assert!(matches!(err, RagError::StoreWrite { .. }));
    }

    #[tokio::test]
    async fn reset_twice_leaves_empty_collection() {
        let store = DocumentStore::new(in_memory(), ResetPolicy::default());
        let handle = store.ensure_collection("study_docs").await.unwrap();
        store.add(&handle, &[Chunk::new("a.txt", 0, "alpha")]).await.unwrap();

        let handle = store.reset("study_docs").await.unwrap();
        assert_eq!(store.count(&handle).await.unwrap(), 0);

        let handle = store.reset("study_docs").await.unwrap();
        assert_eq!(store.count(&handle).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_retries_create_until_it_succeeds() {
        let index = flaky(2, false);
        let store = DocumentStore::new(index.clone(), quick_policy(3));

        let handle = store.reset("study_docs").await.unwrap();
        assert_eq!(index.create_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.count(&handle).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_gives_up_with_store_fatal() {
        let index = flaky(usize::MAX, false);
        let store = DocumentStore::new(index.clone(), quick_policy(2));

        let err = store.reset("study_docs").await.unwrap_err();
        match err {
            RagError::StoreFatal { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(index.create_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_delete_keeps_existing_chunks() {
        let index = Arc::new(FlakyIndex {
            inner: in_memory(),
            create_failures: 0,
            create_calls: AtomicUsize::new(0),
            fail_writes: false,
            fail_deletes: true,
        });
        let store = DocumentStore::new(index.clone(), quick_policy(3));
        let handle = store.ensure_collection("study_docs").await.unwrap();
        store
            .add(&handle, &[Chunk::new("a.txt", 0, "alpha"), Chunk::new("a.txt", 1, "beta")])
            .await
            .unwrap();
        let creates_before = index.create_calls.load(Ordering::SeqCst);

        let err = store.reset("study_docs").await.unwrap_err();
        assert!(matches!(err, RagError::StoreWrite { .. }));
        assert_eq!(store.count(&handle).await.unwrap(), 2);
        assert_eq!(index.create_calls.load(Ordering::SeqCst), creates_before);
    }
}
