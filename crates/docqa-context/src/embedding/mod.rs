//! Embedding providers and vector similarity.

mod client;
mod vocabulary;

pub use client::{Embedding, EmbeddingProvider, OllamaEmbeddingClient, cosine_similarity};
pub use vocabulary::VocabularyEmbedder;
