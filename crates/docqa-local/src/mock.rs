//! Mock language model for testing the responder.
//!
//! Answers come from a queue of scripted replies, then a default. Failures
//! and latency can be injected so error and cancellation paths are testable
//! without a running runtime.

use async_trait::async_trait;
use docqa_core::{Error, Generation, IgnoreLock as _, LanguageModel, Result, TokenSink, TokenUsage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// Mock model returning canned completions.
#[derive(Clone, Default)]
pub struct MockModel {
    /// Replies consumed one per call before anything else is consulted
    script: Arc<Mutex<VecDeque<String>>>,
    /// Reply when nothing else matches
    default_response: Arc<Mutex<Option<String>>>,
    /// Error message returned instead of a completion
    failure: Arc<Mutex<Option<String>>>,
    /// Error message returned after a streamed completion has been emitted
    stream_failure: Arc<Mutex<Option<String>>>,
    /// Artificial latency before answering
    delay: Option<Duration>,
    /// Every prompt received
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockModel {
    /// Model answering "Mock response" to everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues replies returned one per call, in order.
    #[must_use]
    pub fn with_script<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script
            .lock_ignore_poison()
            .extend(replies.into_iter().map(Into::into));
        self
    }

    /// Set a default response for prompts that match nothing.
    #[must_use]
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        *self.default_response.lock_ignore_poison() = Some(response.into());
        self
    }

    /// Delays every completion by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes every subsequent call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock_ignore_poison() = Some(message.into());
    }

    /// Makes streamed calls emit their whole reply and then fail with
    /// `message`, as a runtime dropping the connection mid-answer would.
    pub fn fail_after_streaming(&self, message: impl Into<String>) {
        *self.stream_failure.lock_ignore_poison() = Some(message.into());
    }

    /// Stops injecting failures.
    pub fn recover(&self) {
        *self.failure.lock_ignore_poison() = None;
        *self.stream_failure.lock_ignore_poison() = None;
    }

    /// All prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.call_history.lock_ignore_poison().clone()
    }

    /// Number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_history.lock_ignore_poison().len()
    }

    fn next_reply(&self) -> String {
        if let Some(reply) = self.script.lock_ignore_poison().pop_front() {
            return reply;
        }

        self.default_response
            .lock_ignore_poison()
            .clone()
            .unwrap_or_else(|| "Mock response".to_owned())
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str) -> Result<Generation> {
        self.call_history.lock_ignore_poison().push(prompt.to_owned());

        if let Some(delay) = self.delay {
            sleep(delay).await;
        }

        let failure = self.failure.lock_ignore_poison().clone();
        if let Some(message) = failure {
            return Err(Error::Generation(message));
        }

        let text = self.next_reply();
        Ok(Generation {
            tokens_used: TokenUsage {
                input: prompt.split_whitespace().count() as u64,
                output: text.split_whitespace().count() as u64,
            },
            text,
            provider: "mock".to_owned(),
            latency_ms: 0,
        })
    }

    async fn generate_streaming(&self, prompt: &str, on_token: &TokenSink) -> Result<Generation> {
        let generation = self.generate(prompt).await?;
        for piece in generation.text.split_inclusive(' ') {
            on_token(piece);
        }

        let failure = self.stream_failure.lock_ignore_poison().clone();
        match failure {
            Some(message) => Err(Error::Generation(message)),
            None => Ok(generation),
        }
    }
}
