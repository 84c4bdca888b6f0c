//! Ingestion pipeline: load, chunk, embed, build, save.

use docqa_core::{AppConfig, Chunk, Document, Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::chunking::split_documents;
use crate::embedding::EmbeddingProvider;
use crate::index::{IndexEntry, VectorIndex, save_index_async};
use crate::loader::{DocumentLoader, SkippedFile};

/// Progress callback: (stage, current, total)
pub type ProgressCallback = Arc<dyn Fn(&str, u64, Option<u64>) + Send + Sync>;

/// Summary of one ingestion run.
#[derive(Debug)]
pub struct IngestReport {
    /// Files loaded successfully
    pub files: usize,
    /// Documents (pages) extracted
    pub documents: usize,
    /// Chunks embedded into the index
    pub chunks: usize,
    /// Vector dimension of the index
    pub dimension: usize,
    /// Files that could not be loaded
    pub skipped: Vec<SkippedFile>,
    /// Where the index was written
    pub index_path: PathBuf,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

/// Builds and persists a vector index from a document directory.
pub struct Ingestor<E: EmbeddingProvider> {
    embedder: E,
    loader: DocumentLoader,
    chunk_size: usize,
    chunk_overlap: usize,
    batch_size: usize,
    index_path: PathBuf,
    progress_callback: Option<ProgressCallback>,
}

impl<E: EmbeddingProvider> Ingestor<E> {
    /// Ingestor configured from the `ingest`, `embedding` and `index` sections.
    ///
    /// # Errors
    /// Returns `Error::Config` if the file pattern is invalid
    pub fn new(embedder: E, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            embedder,
            loader: DocumentLoader::from_config(&config.ingest)?,
            chunk_size: config.ingest.chunk_size,
            chunk_overlap: config.ingest.chunk_overlap,
            batch_size: config.embedding.batch_size.max(1),
            index_path: config.index.path.clone(),
            progress_callback: None,
        })
    }

    /// Report progress through `callback`.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn report_progress(&self, stage: &str, current: u64, total: Option<u64>) {
        if let Some(callback) = &self.progress_callback {
            callback(stage, current, total);
        }
    }

    /// Runs the whole pipeline and replaces the index on disk.
    ///
    /// # Errors
    /// Returns an error if the data directory is missing, chunking bounds are
    /// invalid, embedding fails, or the index cannot be written
    pub async fn run(&self) -> Result<IngestReport> {
        let start = Instant::now();
        info!("Loading documents from {}", self.loader.root().display());
        self.report_progress("Loading documents", 0, None);
        let loaded = self.loader.load().await?;

        let index = self.build_index(&loaded.documents).await?;
        let chunks = index.len();
        let dimension = index.dimension();

        self.report_progress("Saving index", 0, None);
        save_index_async(index, self.index_path.clone()).await?;

        Ok(IngestReport {
            files: loaded.files_loaded,
            documents: loaded.documents.len(),
            chunks,
            dimension,
            skipped: loaded.skipped,
            index_path: self.index_path.clone(),
            elapsed: start.elapsed(),
        })
    }

    /// Chunks and embeds `documents` into an in-memory index.
    ///
    /// # Errors
    /// Returns `Error::Config` for invalid chunk bounds, or the embedder's
    /// error if any batch fails
    pub async fn build_index(&self, documents: &[Document]) -> Result<VectorIndex> {
        let chunks: Vec<Chunk> = split_documents(documents, self.chunk_size, self.chunk_overlap)?
            .into_iter()
            .filter(|chunk| !chunk.text.trim().is_empty())
            .collect();
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        if chunks.is_empty() {
            warn!("No text found to index");
            return Ok(VectorIndex::empty(self.embedder.model_name()));
        }

        let entries = self.embed_chunks(chunks).await?;
        VectorIndex::build(self.embedder.model_name(), entries)
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexEntry>> {
        let total = chunks.len();
        let mut entries = Vec::with_capacity(total);
        self.report_progress("Embedding chunks", 0, Some(total as u64));

        let mut pending = chunks.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(self.batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embedder.embed_batch(texts).await?;
            if vectors.len() != batch.len() {
                return Err(Error::Encoding(format!(
                    "Embedded {} of {} chunks in batch",
                    vectors.len(),
                    batch.len()
                )));
            }

            entries.extend(
                vectors
                    .into_iter()
                    .zip(batch)
                    .map(|(vector, chunk)| IndexEntry::new(vector, chunk)),
            );
            debug!("Embedded {}/{} chunks", entries.len(), total);
            self.report_progress("Embedding chunks", entries.len() as u64, Some(total as u64));
        }

        Ok(entries)
    }
}
