use async_trait::async_trait;
use docqa_core::{Generation, LanguageModel, LlmConfig, Result, TokenSink, TokenUsage};
use reqwest::{Client, StatusCode};
use std::time::Instant;
use tracing::debug;

use crate::manager::DEFAULT_OLLAMA_URL;
use crate::models::{GenerateOptions, OllamaGenerateRequest, OllamaGenerateResponse};
use crate::{LocalError, OllamaManager};

/// Local model provider using Ollama
#[derive(Clone)]
pub struct LocalModelProvider {
    client: Client,
    base_url: String,
    model_name: String,
    options: GenerateOptions,
    manager: OllamaManager,
}

impl LocalModelProvider {
    /// Provider for `model_name` on the default local runtime.
    #[must_use]
    pub fn new(model_name: String) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_OLLAMA_URL.to_owned(),
            model_name,
            options: GenerateOptions::default(),
            manager: OllamaManager::new(),
        }
    }

    /// Builds a provider from the `[llm]` config section.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut provider = Self::new(config.model.clone()).with_url(config.host.clone());
        provider.options.temperature = config.temperature;
        provider
    }

    /// Points the provider and its manager at another runtime.
    #[must_use]
    pub fn with_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_owned();
        self.manager = self.manager.with_url(url);
        self
    }

    /// Model this provider generates with.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Manager for the runtime this provider talks to.
    #[must_use]
    pub fn manager(&self) -> &OllamaManager {
        &self.manager
    }

    fn request(&self, prompt: &str, stream: bool) -> OllamaGenerateRequest {
        OllamaGenerateRequest {
            model: self.model_name.clone(),
            prompt: prompt.to_owned(),
            system: None,
            options: self.options.clone(),
            stream,
        }
    }

    async fn send(&self, request: &OllamaGenerateRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|err| LocalError::OllamaUnavailable(format!("Ollama request failed: {err}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LocalError::ModelNotFound(format!(
                "Model '{}' not found. Run: ollama pull {}",
                self.model_name, self.model_name
            ))
            .into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                LocalError::InferenceFailed(format!("Ollama returned {status}: {body}")).into(),
            );
        }
        Ok(response)
    }

    fn finish(&self, text: String, last: &OllamaGenerateResponse, start: Instant) -> Generation {
        Generation {
            text,
            tokens_used: TokenUsage {
                input: last.prompt_eval_count as u64,
                output: last.eval_count as u64,
            },
            provider: format!("Ollama/{}", self.model_name),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Splits complete newline-terminated JSON records off the front of `buffer`.
fn drain_records(buffer: &mut Vec<u8>) -> Result<Vec<OllamaGenerateResponse>> {
    let mut records = Vec::new();
    while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline).collect();
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        records.push(serde_json::from_slice(trimmed).map_err(LocalError::from)?);
    }
    Ok(records)
}

fn check_record(record: &OllamaGenerateResponse) -> Result<()> {
    match &record.error {
        Some(message) => Err(LocalError::InferenceFailed(message.clone()).into()),
        None => Ok(()),
    }
}

#[async_trait]
impl LanguageModel for LocalModelProvider {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn is_available(&self) -> bool {
        self.manager.is_available().await
    }

    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let start = Instant::now();
        let response = self.send(&self.request(prompt, false)).await?;

        let ollama_response: OllamaGenerateResponse = response.json().await.map_err(|err| {
            LocalError::InferenceFailed(format!("Failed to parse Ollama response: {err}"))
        })?;
        check_record(&ollama_response)?;

        let text = ollama_response.response.clone();
        Ok(self.finish(text, &ollama_response, start))
    }

    async fn generate_streaming(&self, prompt: &str, on_token: &TokenSink) -> Result<Generation> {
        let start = Instant::now();
        let mut response = self.send(&self.request(prompt, true)).await?;

        let mut buffer = Vec::new();
        let mut text = String::new();
        let mut last = OllamaGenerateResponse::default();

        while let Some(bytes) = response.chunk().await.map_err(LocalError::from)? {
            buffer.extend_from_slice(&bytes);
            for record in drain_records(&mut buffer)? {
                check_record(&record)?;
                if !record.response.is_empty() {
                    on_token(&record.response);
                    text.push_str(&record.response);
                }
                last = record;
            }
        }
        buffer.push(b'\n');
        for record in drain_records(&mut buffer)? {
            check_record(&record)?;
            on_token(&record.response);
            text.push_str(&record.response);
            last = record;
        }

        if !last.done {
            return Err(LocalError::InferenceFailed(
                "Ollama stream ended before generation completed".to_owned(),
            )
            .into());
        }

        debug!(
            "Streamed {} chars from {} in {}ms",
            text.len(),
            self.model_name,
            start.elapsed().as_millis()
        );
        Ok(self.finish(text, &last, start))
    }
}
