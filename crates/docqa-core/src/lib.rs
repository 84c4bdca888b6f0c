//! Core types and traits for the document question-answering assistant.
//!
//! This crate provides the error taxonomy, configuration, document and chunk
//! types, conversation memory, and the language-model trait shared by the
//! rest of the workspace.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Test allows"
    )
)]

/// Configuration loading and validation.
pub mod config;
/// Conversation memory with a sliding window of exchanges.
pub mod conversation;
/// Error types and result definitions.
pub mod error;
/// Synchronization helpers.
pub mod sync;
/// Trait definitions for language models.
pub mod traits;
/// Documents, chunks, and usage accounting.
pub mod types;

pub use config::{
    AppConfig, Device, EmbeddingConfig, GateReference, IndexConfig, IngestConfig, LlmConfig,
    MemoryConfig, PromptConfig, RetrievalConfig, SessionConfig,
};
pub use conversation::{ConversationMemory, Role, Turn};
pub use error::{Error, Result};
pub use sync::IgnoreLock;
pub use traits::{Generation, LanguageModel, TokenSink};
pub use types::{Chunk, Document, ScoredChunk, SourceRef, TokenUsage};
