//! Fixed-size overlapping chunking.
//!
//! Text is cut into windows of `chunk_size` characters whose starts advance
//! by `chunk_size - overlap`. Windows are counted in Unicode scalar values so
//! a chunk never splits a multi-byte character. There is no sentence or
//! paragraph awareness: output depends only on character offsets.

use std::iter;

use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks with ids and provenance metadata.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into fixed-size character windows with a fixed overlap.
///
/// Chunk IDs are generated as `{document_name}_{chunk_index}`.
///
/// # Example
///
/// ```rust,ignore
/// use study_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(4, 1)?;
/// assert_eq!(chunker.split("abcdefghij"), vec!["abcd", "defg", "ghij"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfig`] if either parameter is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_window(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into ordered windows.
    pub fn split(&self, text: &str) -> Vec<String> {
        sliding_windows(text, self.chunk_size, self.chunk_overlap)
    }
}

impl Default for FixedSizeChunker {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk::new(&document.name, index, text))
            .collect()
    }
}

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfig`] if either parameter is zero or
/// `overlap >= chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    validate_window(chunk_size, overlap)?;
    Ok(sliding_windows(text, chunk_size, overlap))
}

pub(crate) fn validate_window(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfig("chunk_size must be greater than zero".to_string()));
    }
    if overlap == 0 {
        return Err(RagError::InvalidConfig("chunk_overlap must be greater than zero".to_string()));
    }
    if overlap >= chunk_size {
        return Err(RagError::InvalidConfig(format!(
            "chunk_overlap ({overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Parameters must already be validated.
fn sliding_windows(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // Byte offset of every character start, plus the end of the text.
    let boundaries: Vec<usize> =
        text.char_indices().map(|(offset, _)| offset).chain(iter::once(text.len())).collect();
    let char_count = boundaries.len() - 1;
    let step = chunk_size - overlap;

    let mut chunks = Vec::with_capacity(char_count / step + 1);
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        // The window touching the end of the text is the last one.
        if end == char_count {
            break;
        }
        start += step;
    }

    chunks
}
