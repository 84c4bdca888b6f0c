//! Exact nearest-neighbor index over chunk embeddings.
//!
//! The index is built once from all entries and never mutated afterwards;
//! share it as `Arc<VectorIndex>` and query it concurrently.

mod persistence;

use docqa_core::{Chunk, Error, Result, ScoredChunk};
use std::cmp::Ordering;

use crate::embedding::{Embedding, cosine_similarity};

pub use persistence::{
    CHUNKS_FILE, FORMAT_VERSION, VECTORS_FILE, load_index, load_index_async, save_index,
    save_index_async,
};

/// One embedded chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Embedding of `chunk.text`
    pub vector: Embedding,
    /// The chunk itself, with its source
    pub chunk: Chunk,
}

impl IndexEntry {
    /// Pairs a vector with its chunk.
    pub fn new(vector: Embedding, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}

/// Flat cosine-similarity index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    /// Embedding model the vectors came from
    model: String,
    /// Shared vector length (0 while empty)
    dimension: usize,
    /// Entries in insertion order
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Builds an index from all entries at once.
    ///
    /// # Errors
    /// Returns `Error::DimensionMismatch` if the vectors differ in length, or
    /// `Error::Encoding` if they are empty
    pub fn build(model: impl Into<String>, entries: Vec<IndexEntry>) -> Result<Self> {
        let dimension = entries.first().map_or(0, |entry| entry.vector.len());
        if !entries.is_empty() && dimension == 0 {
            return Err(Error::Encoding("Cannot index empty vectors".to_owned()));
        }
        if let Some(entry) = entries
            .iter()
            .find(|entry| entry.vector.len() != dimension)
        {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: entry.vector.len(),
            });
        }

        Ok(Self {
            model: model.into(),
            dimension,
            entries,
        })
    }

    /// An index with no entries.
    pub fn empty(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            dimension: 0,
            entries: Vec::new(),
        }
    }

    /// Returns the `k` chunks most similar to `vector`, best first.
    ///
    /// Equal scores keep insertion order.
    ///
    /// # Errors
    /// Returns `Error::EmptyIndex` when there is nothing to search and `k > 0`,
    /// or `Error::DimensionMismatch` for a query of the wrong length
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if self.entries.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(vector, &entry.vector)))
            .collect();

        // sort_by is stable, so ties stay in insertion order
        scored.sort_by(|first, second| second.1.partial_cmp(&first.1).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .filter_map(|(position, score)| {
                self.entries.get(position).map(|entry| ScoredChunk {
                    chunk: entry.chunk.clone(),
                    score,
                })
            })
            .collect())
    }

    /// Embedding model name recorded at build time.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Vector length shared by all entries.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
