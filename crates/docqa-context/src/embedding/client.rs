//! Embedding generation using Ollama.

use docqa_core::{Device, EmbeddingConfig, Error, Result};
use ollama_rs::Ollama;
use ollama_rs::error::OllamaError;
use ollama_rs::generation::embeddings::request::GenerateEmbeddingsRequest;
use ollama_rs::models::ModelOptions;
use reqwest::Url;
use std::future::Future;
use tokio::process::Command;
use tracing::{debug, info};

/// A single embedding vector
pub type Embedding = Vec<f32>;

/// Trait for generating embeddings from text
pub trait EmbeddingProvider: Send + Sync {
    /// Name of the model producing the vectors
    fn model_name(&self) -> &str;

    /// Ensure the embedding model is available
    ///
    /// # Errors
    /// Returns an error if the model is not available or cannot be loaded
    fn ensure_model_available(&self) -> impl Future<Output = Result<()>> + Send;

    /// Generate embedding for text
    ///
    /// # Errors
    /// Returns an error if embedding generation fails
    fn embed(&self, text: &str) -> impl Future<Output = Result<Embedding>> + Send;

    /// Embed multiple texts in one request, preserving order
    ///
    /// # Errors
    /// Returns an error if any embedding generation fails
    fn embed_batch(
        &self,
        texts: Vec<String>,
    ) -> impl Future<Output = Result<Vec<Embedding>>> + Send;
}

/// Ollama embedding client
#[derive(Clone)]
pub struct OllamaEmbeddingClient {
    ollama: Ollama,
    host: String,
    model: String,
    device: Device,
}

impl OllamaEmbeddingClient {
    /// Create a client for `model` served at `host`.
    ///
    /// # Errors
    /// Returns `Error::Config` if `host` is not a valid URL
    #[allow(deprecated, reason = "Ollama::new is deprecated in ollama-rs 0.3.x but still functional")]
    pub fn new(model: impl Into<String>, host: &str) -> Result<Self> {
        let host = host.trim_end_matches('/').to_owned();
        let url = Url::parse(&host)
            .map_err(|error| Error::Config(format!("Invalid Ollama host '{host}': {error}")))?;
        let port = url.port_or_known_default().unwrap_or(11434);
        let base = format!("{}://{}", url.scheme(), url.host_str().unwrap_or("localhost"));

        Ok(Self {
            ollama: Ollama::new(base, port),
            host,
            model: model.into(),
            device: Device::Cpu,
        })
    }

    /// Create a client from the `[embedding]` config section.
    ///
    /// # Errors
    /// Returns `Error::Config` if the configured host is not a valid URL
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::new(config.model_name.clone(), &config.host)?.with_device(config.device))
    }

    /// Select where the runtime should place the model.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    fn request_options(&self) -> Option<ModelOptions> {
        match self.device {
            Device::Cpu => Some(ModelOptions::default().num_gpu(0)),
            Device::Gpu => None,
        }
    }

    fn unavailable(&self, detail: &str) -> Error {
        Error::ModelUnavailable(format!(
            "Embedding model '{}' is not available ({detail}). Run: ollama pull {}",
            self.model, self.model
        ))
    }

    fn request_error(&self, error: OllamaError) -> Error {
        match error {
            OllamaError::ReqwestError(source) if source.is_connect() || source.is_timeout() => {
                Error::ModelUnavailable(format!(
                    "Failed to connect to Ollama at {}: {source}",
                    self.host
                ))
            }
            OllamaError::Other(body) if body.contains("not found") => self.unavailable(&body),
            OllamaError::JsonError(source) => {
                Error::Encoding(format!("Malformed embedding response: {source}"))
            }
            other => Error::Encoding(format!("Embedding request failed: {other:?}")),
        }
    }

    async fn request_embeddings(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        let expected = texts.len();
        let mut request = GenerateEmbeddingsRequest::new(self.model.clone(), texts.into());
        if let Some(options) = self.request_options() {
            request = request.options(options);
        }

        let response = self
            .ollama
            .generate_embeddings(request)
            .await
            .map_err(|error| self.request_error(error))?;

        if response.embeddings.len() != expected {
            return Err(Error::Encoding(format!(
                "Expected {expected} embeddings, received {}",
                response.embeddings.len()
            )));
        }
        if response.embeddings.iter().any(Vec::is_empty) {
            return Err(Error::Encoding("Received an empty embedding vector".to_owned()));
        }

        Ok(response.embeddings)
    }
}

impl EmbeddingProvider for OllamaEmbeddingClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn ensure_model_available(&self) -> Result<()> {
        let models = self.ollama.list_local_models().await.map_err(|error| {
            Error::ModelUnavailable(format!(
                "Failed to connect to Ollama: {error}.\n\nPlease ensure Ollama is installed and running:\n  - Install from: https://ollama.ai\n  - Start with: ollama serve"
            ))
        })?;

        if models.iter().any(|model| model.name.contains(&self.model)) {
            debug!("Embedding model '{}' is available", self.model);
            return Ok(());
        }

        info!("Embedding model '{}' not found, pulling it", self.model);
        let status = Command::new("ollama")
            .args(["pull", &self.model])
            .status()
            .await
            .map_err(|error| {
                Error::ModelUnavailable(format!(
                    "Failed to run 'ollama pull {}': {error}. Is Ollama installed?",
                    self.model
                ))
            })?;

        if !status.success() {
            return Err(self.unavailable("pull failed"));
        }

        info!("Pulled embedding model '{}'", self.model);
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(Error::Encoding("Cannot embed empty text".to_owned()));
        }
        self.request_embeddings(vec![text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Encoding("No embeddings returned".to_owned()))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::default());
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(Error::Encoding("Cannot embed empty text".to_owned()));
        }
        self.request_embeddings(texts).await
    }
}

/// Calculate cosine similarity between two vectors
///
/// Vectors of different lengths, or with zero magnitude, score 0.
pub fn cosine_similarity(vector_a: &[f32], vector_b: &[f32]) -> f32 {
    if vector_a.len() != vector_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vector_a
        .iter()
        .zip(vector_b.iter())
        .map(|(left, right)| left * right)
        .sum();
    let magnitude_a = vector_a.iter().map(|value| value * value).sum::<f32>().sqrt();
    let magnitude_b = vector_b.iter().map(|value| value * value).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
