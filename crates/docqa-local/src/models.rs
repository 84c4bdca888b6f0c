use serde::{Deserialize, Serialize};

/// Ollama API response for model list
#[derive(Debug, Deserialize)]
pub struct OllamaListResponse {
    /// List of models installed in Ollama.
    pub models: Vec<OllamaModel>,
}

/// Information about an Ollama model returned from the API.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    /// Model identifier.
    pub name: String,
    /// Size of the model in bytes.
    #[serde(default)]
    pub size: u64,
    /// Content digest for the model.
    #[serde(default)]
    pub digest: String,
    /// Timestamp of last modification.
    #[serde(default)]
    pub modified_at: String,
}

/// Sampling options forwarded to the runtime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateOptions {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
}

impl GenerateOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

/// Ollama API request for generation
#[derive(Debug, Serialize)]
pub struct OllamaGenerateRequest {
    /// Model to use for generation.
    pub model: String,
    /// Input prompt for the model.
    pub prompt: String,
    /// Optional system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Sampling options.
    #[serde(skip_serializing_if = "GenerateOptions::is_empty")]
    pub options: GenerateOptions,
    /// Whether to stream the response as newline-delimited JSON.
    pub stream: bool,
}

/// Ollama API response for generation; one per line when streaming.
#[derive(Debug, Default, Deserialize)]
pub struct OllamaGenerateResponse {
    /// Model that generated the response.
    #[serde(default)]
    pub model: String,
    /// Generated text content (a fragment when streaming).
    #[serde(default)]
    pub response: String,
    /// Whether generation is complete.
    #[serde(default)]
    pub done: bool,
    /// Runtime-reported error, if any.
    #[serde(default)]
    pub error: Option<String>,
    /// Total time taken in nanoseconds.
    #[serde(default)]
    pub total_duration: u64,
    /// Number of tokens in the prompt.
    #[serde(default)]
    pub prompt_eval_count: usize,
    /// Number of tokens generated.
    #[serde(default)]
    pub eval_count: usize,
}
