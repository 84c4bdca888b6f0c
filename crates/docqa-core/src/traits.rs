use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Result, TokenUsage};

/// Callback receiving generated text incrementally.
pub type TokenSink = dyn Fn(&str) + Send + Sync;

/// Completed output of a language model call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Generation {
    /// Full generated text
    pub text: String,
    /// Token accounting, when the runtime reports it
    pub tokens_used: TokenUsage,
    /// Provider and model that produced the text
    pub provider: String,
    /// Wall-clock latency of the call
    pub latency_ms: u64,
}

/// A language model that completes a prompt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the identifier of this model provider.
    fn name(&self) -> &str;

    /// Checks whether the model runtime is reachable.
    async fn is_available(&self) -> bool;

    /// Generates a completion for the prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime is unavailable, the request fails,
    /// or the response cannot be parsed.
    async fn generate(&self, prompt: &str) -> Result<Generation>;

    /// Generates a completion, forwarding text fragments to `on_token` as
    /// they arrive. Providers without streaming support emit the whole text
    /// once.
    ///
    /// # Errors
    ///
    /// Same as [`LanguageModel::generate`].
    async fn generate_streaming(&self, prompt: &str, on_token: &TokenSink) -> Result<Generation> {
        let generation = self.generate(prompt).await?;
        on_token(&generation.text);
        Ok(generation)
    }
}
