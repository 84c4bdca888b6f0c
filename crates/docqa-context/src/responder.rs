//! Retrieval-augmented answering.
//!
//! One request runs: topic-shift gate, retrieval, prompt rendering, then
//! generation. Work happens on a copy of the caller's memory which is only
//! written back after the model has answered, so a failed or cancelled
//! request leaves memory exactly as it was.

use docqa_core::{
    AppConfig, ConversationMemory, Error, Generation, LanguageModel, Result, ScoredChunk,
    SourceRef, TokenSink, TokenUsage,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::gate::{GateOutcome, TopicShiftGate};
use crate::index::VectorIndex;
use crate::prompt::PromptTemplate;

/// Appended to displayed answers that used no retrieved context
pub const NO_SOURCES_NOTICE: &str = "No sources found.";

/// An answer and how it was produced.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Model output
    pub text: String,
    /// Chunks included in the prompt, best first
    pub sources: Vec<ScoredChunk>,
    /// Whether any retrieved context reached the prompt
    pub has_sources: bool,
    /// Whether the topic-shift gate cleared memory for this question
    pub memory_reset: bool,
    /// Token accounting reported by the model
    pub usage: TokenUsage,
    /// Wall-clock time for the whole request
    pub latency_ms: u64,
}

impl Answer {
    /// Answer text for display, with a notice when no sources were used.
    #[must_use]
    pub fn display_text(&self) -> String {
        if self.has_sources {
            self.text.clone()
        } else {
            format!("{}\n{NO_SOURCES_NOTICE}", self.text)
        }
    }

    /// Distinct source locations, in ranking order.
    #[must_use]
    pub fn source_refs(&self) -> Vec<&SourceRef> {
        let mut refs: Vec<&SourceRef> = Vec::new();
        for scored in &self.sources {
            if !refs.contains(&&scored.chunk.source) {
                refs.push(&scored.chunk.source);
            }
        }
        refs
    }
}

/// Answers questions over a vector index with a language model.
pub struct Responder<E: EmbeddingProvider> {
    embedder: E,
    model: Arc<dyn LanguageModel>,
    index: Arc<VectorIndex>,
    gate: TopicShiftGate,
    template: PromptTemplate,
    top_k: usize,
    min_score: Option<f32>,
    max_prompt_tokens: usize,
    timeout: Duration,
}

impl<E: EmbeddingProvider> Responder<E> {
    /// Responder configured from the `retrieval`, `memory`, `llm` and
    /// `prompt` sections.
    ///
    /// # Errors
    /// Returns `Error::Config` if the prompt template is invalid
    pub fn new(
        embedder: E,
        model: Arc<dyn LanguageModel>,
        index: Arc<VectorIndex>,
        config: &AppConfig,
    ) -> Result<Self> {
        Ok(Self {
            embedder,
            model,
            index,
            gate: TopicShiftGate::from_config(&config.memory),
            template: PromptTemplate::new(config.prompt.template.clone())?,
            top_k: config.retrieval.top_k,
            min_score: config.retrieval.min_score,
            max_prompt_tokens: config.prompt.max_prompt_tokens,
            timeout: Duration::from_secs(config.llm.timeout_seconds),
        })
    }

    /// Override how many chunks are retrieved.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Override the generation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the topic-shift gate.
    #[must_use]
    pub fn with_gate(mut self, gate: TopicShiftGate) -> Self {
        self.gate = gate;
        self
    }

    /// Index being searched.
    #[must_use]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Answers `question`, committing the exchange to `memory` on success.
    ///
    /// # Errors
    /// Returns `Error::Retrieval` if the question cannot be embedded or the
    /// index cannot be searched, and `Error::Generation` if the model fails
    /// or times out. `memory` is unchanged on error.
    pub async fn answer(&self, question: &str, memory: &mut ConversationMemory) -> Result<Answer> {
        self.respond(question, memory, None).await
    }

    /// Like [`Self::answer`], passing generated text to `on_token` as it
    /// arrives.
    ///
    /// # Errors
    /// See [`Self::answer`]
    pub async fn answer_streaming(
        &self,
        question: &str,
        memory: &mut ConversationMemory,
        on_token: &TokenSink,
    ) -> Result<Answer> {
        self.respond(question, memory, Some(on_token)).await
    }

    /// Chunks most relevant to `question_vector`, after the score cutoff.
    ///
    /// Chunks with no positive similarity never count as matches. An empty
    /// index yields no chunks rather than an error.
    ///
    /// # Errors
    /// Returns `Error::Retrieval` if the query is malformed for this index
    pub fn retrieve(&self, question_vector: &[f32]) -> Result<Vec<ScoredChunk>> {
        let hits = match self.index.query(question_vector, self.top_k) {
            Ok(hits) => hits,
            Err(Error::EmptyIndex) => {
                debug!("Index is empty, answering without context");
                Vec::new()
            }
            Err(error) => return Err(Error::Retrieval(error.to_string())),
        };

        let min_score = self.min_score;
        Ok(hits
            .into_iter()
            .filter(|hit| hit.score > 0.0 && min_score.is_none_or(|min| hit.score >= min))
            .collect())
    }

    async fn respond(
        &self,
        question: &str,
        memory: &mut ConversationMemory,
        on_token: Option<&TokenSink>,
    ) -> Result<Answer> {
        let start = Instant::now();
        let mut working = memory.clone();

        let question_vector = self
            .embedder
            .embed(question)
            .await
            .map_err(|error| Error::Retrieval(format!("Failed to embed question: {error}")))?;

        let outcome = if working.is_empty() {
            GateOutcome::Empty
        } else {
            self.gate
                .maybe_reset_with(&self.embedder, &question_vector, &mut working)
                .await
        };

        let hits = self.retrieve(&question_vector)?;
        let prompt = self
            .template
            .render(question, working.turns(), &hits, self.max_prompt_tokens);
        let sources: Vec<ScoredChunk> = hits.into_iter().take(prompt.chunks_included).collect();
        debug!(
            "Prompt uses {} chunks and {} history turns (truncated: {})",
            sources.len(),
            prompt.turns_included,
            prompt.truncated
        );

        let generation = self.generate(&prompt.text, on_token).await?;

        working.push_exchange(question, generation.text.clone());
        *memory = working;

        let answer = Answer {
            has_sources: !sources.is_empty(),
            text: generation.text,
            sources,
            memory_reset: outcome.is_reset(),
            usage: generation.tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Answered in {}ms with {} sources",
            answer.latency_ms,
            answer.sources.len()
        );
        Ok(answer)
    }

    async fn generate(&self, prompt: &str, on_token: Option<&TokenSink>) -> Result<Generation> {
        let request = async {
            match on_token {
                Some(sink) => self.model.generate_streaming(prompt, sink).await,
                None => self.model.generate(prompt).await,
            }
        };

        match timeout(self.timeout, request).await {
            Ok(Ok(generation)) => Ok(generation),
            Ok(Err(Error::Generation(message))) => Err(Error::Generation(message)),
            Ok(Err(error)) => Err(Error::Generation(error.to_string())),
            Err(_elapsed) => Err(Error::Generation(format!(
                "{} did not answer within {}s",
                self.model.name(),
                self.timeout.as_secs()
            ))),
        }
    }
}
