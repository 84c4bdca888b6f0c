use crate::models::{OllamaListResponse, OllamaModel};
use crate::{LocalError, Result};
use reqwest::Client;
use tracing::info;

/// Default address of a local Ollama runtime.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Checks the Ollama runtime and manages installed models
#[derive(Clone)]
pub struct OllamaManager {
    /// HTTP client used to interact with the Ollama service.
    client: Client,
    /// Base URL pointing to the Ollama runtime.
    base_url: String,
}

impl OllamaManager {
    /// Manager for the default local runtime.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_OLLAMA_URL.to_owned(),
        }
    }

    /// Use the runtime at `url`.
    #[must_use]
    pub fn with_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_owned();
        self
    }

    /// Base URL of the runtime.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if Ollama is running
    pub async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    /// List installed models
    ///
    /// # Errors
    ///
    /// Returns an error if Ollama is not available or if the response cannot be parsed
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|err| LocalError::OllamaUnavailable(err.to_string()))?;

        let list: OllamaListResponse = response.json().await?;
        Ok(list.models)
    }

    /// Check if a specific model is installed. A name without a tag matches
    /// any tag of that model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model list cannot be retrieved
    pub async fn has_model(&self, model_name: &str) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .any(|model| model_matches(&model.name, model_name)))
    }

    /// Pull a model from Ollama registry
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be pulled
    pub async fn pull_model(&self, model_name: &str) -> Result<()> {
        info!("Pulling model '{model_name}' from Ollama (this may take a few minutes)");
        let response = self
            .client
            .post(format!("{}/api/pull", self.base_url))
            .json(&serde_json::json!({
                "model": model_name,
                "stream": false
            }))
            .send()
            .await?;

        if response.status().is_success() {
            info!("Pulled model '{model_name}'");
            Ok(())
        } else {
            Err(LocalError::ModelPullFailed(format!(
                "Failed to pull model {}: {}",
                model_name,
                response.status()
            )))
        }
    }

    /// Ensure a model is available, pulling if necessary
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be verified or pulled
    pub async fn ensure_model(&self, model_name: &str) -> Result<()> {
        if !self.has_model(model_name).await? {
            self.pull_model(model_name).await?;
        }
        Ok(())
    }
}

impl Default for OllamaManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an installed model name satisfies a requested one.
fn model_matches(installed: &str, requested: &str) -> bool {
    if requested.contains(':') {
        installed == requested
    } else {
        installed
            .split_once(':')
            .map_or(installed, |(name, _)| name)
            == requested
    }
}
