//! Retrieval pipeline: chunking, embeddings, the vector index, ingestion,
//! the topic-shift memory gate, prompt rendering and the responder.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Test allows"
    )
)]

/// Splitting documents into overlapping chunks.
pub mod chunking;
/// Embedding providers and similarity.
pub mod embedding;
/// Topic-shift memory gate.
pub mod gate;
/// Vector index and its on-disk format.
pub mod index;
/// Ingestion pipeline.
pub mod ingest;
/// Document discovery and text extraction.
pub mod loader;
/// Prompt template and truncation.
pub mod prompt;
/// Retrieval-augmented responder.
pub mod responder;
/// Sessions and session stores.
pub mod session;

pub use chunking::{estimate_tokens, split_documents};
pub use embedding::{
    Embedding, EmbeddingProvider, OllamaEmbeddingClient, VocabularyEmbedder, cosine_similarity,
};
pub use gate::{GateOutcome, TopicShiftGate, should_reset};
pub use index::{IndexEntry, VectorIndex, load_index, load_index_async, save_index, save_index_async};
pub use ingest::{IngestReport, Ingestor, ProgressCallback};
pub use loader::{DocumentLoader, LoadReport, SkippedFile};
pub use prompt::{PromptTemplate, RenderedPrompt};
pub use responder::{Answer, NO_SOURCES_NOTICE, Responder};
pub use session::{FileSessionStore, InMemorySessionStore, SessionContext, SessionStore};
