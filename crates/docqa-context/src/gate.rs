//! Topic-shift detection for conversation memory.
//!
//! Before answering, the new question is compared with the most recent turn
//! in memory. When the two are less similar than the threshold the
//! conversation is treated as having changed topic and memory is cleared.

use docqa_core::{ConversationMemory, GateReference, MemoryConfig};
use tracing::{debug, info, warn};

use crate::embedding::{EmbeddingProvider, cosine_similarity};

/// Whether a question with embedding `question` has left the topic of `reference`.
pub fn should_reset(question: &[f32], reference: &[f32], threshold: f32) -> bool {
    cosine_similarity(question, reference) < threshold
}

/// What the gate did to memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateOutcome {
    /// Memory was empty, nothing to compare
    Empty,
    /// Same topic; memory kept
    Kept {
        /// Cosine similarity to the reference turn
        similarity: f32,
    },
    /// Topic changed; memory cleared
    Reset {
        /// Cosine similarity to the reference turn
        similarity: f32,
    },
    /// Reference could not be embedded; memory kept
    Skipped,
}

impl GateOutcome {
    /// Whether memory was cleared.
    #[must_use]
    pub fn is_reset(self) -> bool {
        matches!(self, Self::Reset { .. })
    }
}

/// Clears conversation memory on topic changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopicShiftGate {
    threshold: f32,
    reference: GateReference,
}

impl TopicShiftGate {
    /// Default similarity threshold below which memory resets
    pub const DEFAULT_THRESHOLD: f32 = 0.15;

    /// Gate comparing against `reference` with the given `threshold`.
    #[must_use]
    pub fn new(threshold: f32, reference: GateReference) -> Self {
        Self {
            threshold,
            reference,
        }
    }

    /// Gate from the `[memory]` config section.
    #[must_use]
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.topic_shift_threshold, config.reference)
    }

    /// Similarity threshold in use.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Embeds `question` and clears `memory` if the topic changed.
    ///
    /// Embedding failures never clear memory; they are logged and reported
    /// as [`GateOutcome::Skipped`].
    pub async fn maybe_reset<E: EmbeddingProvider>(
        &self,
        embedder: &E,
        question: &str,
        memory: &mut ConversationMemory,
    ) -> GateOutcome {
        if memory.is_empty() {
            return GateOutcome::Empty;
        }
        match embedder.embed(question).await {
            Ok(vector) => self.maybe_reset_with(embedder, &vector, memory).await,
            Err(error) => {
                warn!("Topic-shift check skipped, question embedding failed: {error}");
                GateOutcome::Skipped
            }
        }
    }

    /// Same as [`Self::maybe_reset`] for a question that is already embedded.
    pub async fn maybe_reset_with<E: EmbeddingProvider>(
        &self,
        embedder: &E,
        question_vector: &[f32],
        memory: &mut ConversationMemory,
    ) -> GateOutcome {
        let reference = match self.reference {
            GateReference::LastTurn => memory.last_turn(),
            GateReference::LastQuestion => memory.last_user_turn(),
        };
        let Some(reference) = reference else {
            return GateOutcome::Empty;
        };

        let reference_vector = match embedder.embed(&reference.text).await {
            Ok(vector) => vector,
            Err(error) => {
                warn!("Topic-shift check skipped, reference embedding failed: {error}");
                return GateOutcome::Skipped;
            }
        };

        let similarity = cosine_similarity(question_vector, &reference_vector);
        if should_reset(question_vector, &reference_vector, self.threshold) {
            info!(
                "Topic change detected (similarity {similarity:.3} < {:.3}), clearing memory",
                self.threshold
            );
            memory.clear();
            GateOutcome::Reset { similarity }
        } else {
            debug!("Same topic (similarity {similarity:.3})");
            GateOutcome::Kept { similarity }
        }
    }
}

impl Default for TopicShiftGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD, GateReference::LastTurn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::VocabularyEmbedder;

    fn embedder() -> VocabularyEmbedder {
        VocabularyEmbedder::new(["boss", "drops", "life", "capital", "france"])
    }

    #[test]
    fn test_should_reset_rule() {
        assert!(should_reset(&[1.0, 0.0], &[0.0, 1.0], 0.15));
        assert!(!should_reset(&[1.0, 0.0], &[1.0, 0.1], 0.15));
        // Exactly at the threshold keeps memory
        assert!(!should_reset(&[1.0, 0.0], &[1.0, 0.0], 1.0));
    }

    #[tokio::test]
    async fn test_empty_memory_never_resets() {
        let mut memory = ConversationMemory::default();
        let outcome = TopicShiftGate::default()
            .maybe_reset(&embedder(), "What is the capital of France?", &mut memory)
            .await;
        assert_eq!(outcome, GateOutcome::Empty);
    }

    #[tokio::test]
    async fn test_related_question_keeps_memory() {
        let mut memory = ConversationMemory::default();
        memory.push_exchange("What does the boss drop?", "The boss drops lots of life.");

        let outcome = TopicShiftGate::default()
            .maybe_reset(&embedder(), "How much life?", &mut memory)
            .await;
        assert!(matches!(outcome, GateOutcome::Kept { .. }));
        assert_eq!(memory.len(), 2);
    }

    #[tokio::test]
    async fn test_unrelated_question_clears_memory() {
        let mut memory = ConversationMemory::default();
        memory.push_exchange("What does the boss drop?", "The boss drops lots of life.");

        let outcome = TopicShiftGate::default()
            .maybe_reset(&embedder(), "What is the capital of France?", &mut memory)
            .await;
        assert!(outcome.is_reset());
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_last_question_reference() {
        let mut memory = ConversationMemory::default();
        memory.push_exchange("What is the capital of France?", "It has lots of life.");

        let gate = TopicShiftGate::new(0.15, GateReference::LastQuestion);
        let kept = gate
            .maybe_reset(&embedder(), "capital of France again", &mut memory)
            .await;
        assert!(matches!(kept, GateOutcome::Kept { .. }));

        let last_turn_gate = TopicShiftGate::new(0.15, GateReference::LastTurn);
        let reset = last_turn_gate
            .maybe_reset(&embedder(), "capital of France again", &mut memory)
            .await;
        assert!(reset.is_reset());
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_memory() {
        let mut memory = ConversationMemory::default();
        memory.push_exchange("What does the boss drop?", "Souls.");
        let failing = embedder();
        failing.fail_with("offline");

        let outcome = TopicShiftGate::default()
            .maybe_reset(&failing, "What is the capital of France?", &mut memory)
            .await;
        assert_eq!(outcome, GateOutcome::Skipped);
        assert_eq!(memory.len(), 2);
    }
}
