//! Deterministic bag-of-words embedder.
//!
//! Each vocabulary word owns one dimension; a text's vector counts the
//! vocabulary words it contains. Words outside the vocabulary are ignored.
//! Used wherever tests need exact, explainable similarities without a model
//! runtime.

use docqa_core::{Error, IgnoreLock as _, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::client::{Embedding, EmbeddingProvider};

/// Bag-of-words embedder over a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct VocabularyEmbedder {
    /// Word to dimension mapping
    dimensions: Arc<HashMap<String, usize>>,
    /// Error returned instead of embeddings while set
    failure: Arc<Mutex<Option<String>>>,
    /// Number of texts embedded so far
    embedded: Arc<AtomicUsize>,
}

impl VocabularyEmbedder {
    /// Builds an embedder whose dimensions are the distinct words, in order.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dimensions = HashMap::new();
        for word in words {
            let next = dimensions.len();
            dimensions
                .entry(word.as_ref().to_lowercase())
                .or_insert(next);
        }
        Self {
            dimensions: Arc::new(dimensions),
            failure: Arc::new(Mutex::new(None)),
            embedded: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Vector dimensionality (the vocabulary size).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimensions.len()
    }

    /// Makes every subsequent call fail with `Error::ModelUnavailable`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock_ignore_poison() = Some(message.into());
    }

    /// Stops injecting failures.
    pub fn recover(&self) {
        *self.failure.lock_ignore_poison() = None;
    }

    /// Number of texts embedded so far, across clones.
    #[must_use]
    pub fn embedded_count(&self) -> usize {
        self.embedded.load(Ordering::Relaxed)
    }

    fn vectorize(&self, text: &str) -> Result<Embedding> {
        if let Some(message) = self.failure.lock_ignore_poison().clone() {
            return Err(Error::ModelUnavailable(message));
        }
        if text.trim().is_empty() {
            return Err(Error::Encoding("Cannot embed empty text".to_owned()));
        }

        let mut vector = vec![0.0; self.dimensions.len()];
        for word in text
            .split(|character: char| !character.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            if let Some(&dimension) = self.dimensions.get(&word.to_lowercase())
                && let Some(slot) = vector.get_mut(dimension)
            {
                *slot += 1.0;
            }
        }
        self.embedded.fetch_add(1, Ordering::Relaxed);
        Ok(vector)
    }
}

impl EmbeddingProvider for VocabularyEmbedder {
    fn model_name(&self) -> &str {
        "vocabulary"
    }

    async fn ensure_model_available(&self) -> Result<()> {
        match self.failure.lock_ignore_poison().clone() {
            Some(message) => Err(Error::ModelUnavailable(message)),
            None => Ok(()),
        }
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.vectorize(text)
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        texts.iter().map(|text| self.vectorize(text)).collect()
    }
}
