//! Configuration for ingestion, retrieval, memory, and generation.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding both Ollama hosts.
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
/// Environment variable overriding the generation model.
pub const ENV_LLM_MODEL: &str = "DOCQA_LLM_MODEL";
/// Environment variable overriding the embedding model.
pub const ENV_EMBEDDING_MODEL: &str = "DOCQA_EMBEDDING_MODEL";

const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Prompt used when the config does not provide one.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are a helpful assistant. Use the following conversation history and context to provide a concise answer, only referencing history when needed.

Conversation History: {chat_history}

Context: {context}

Question: {question}

Answer:
";

/// Complete application configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Document ingestion settings
    pub ingest: IngestConfig,
    /// Embedding model settings
    pub embedding: EmbeddingConfig,
    /// Index location
    pub index: IndexConfig,
    /// Retrieval settings
    pub retrieval: RetrievalConfig,
    /// Conversation memory settings
    pub memory: MemoryConfig,
    /// Language model settings
    pub llm: LlmConfig,
    /// Prompt template settings
    pub prompt: PromptConfig,
    /// Session persistence settings
    pub session: SessionConfig,
}

/// Document ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory holding source documents
    pub data_path: PathBuf,
    /// Glob matched against file names inside `data_path`
    pub file_pattern: String,
    /// Maximum characters of fresh text per chunk
    pub chunk_size: usize,
    /// Characters repeated from the previous chunk
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data"),
            file_pattern: "*.pdf".to_owned(),
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Compute device requested for the embedding model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Run on the CPU only
    #[default]
    Cpu,
    /// Let the runtime place layers on the GPU
    Gpu,
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama embedding model name
    pub model_name: String,
    /// Compute device
    pub device: Device,
    /// Ollama base URL
    pub host: String,
    /// Number of chunks sent per embedding request during ingestion
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "all-minilm".to_owned(),
            device: Device::Cpu,
            host: DEFAULT_OLLAMA_HOST.to_owned(),
            batch_size: 50,
        }
    }
}

/// Vector index location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory the index is saved to and loaded from
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vectorstores").join("db"),
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    pub top_k: usize,
    /// Chunks scoring below this are not treated as sources
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 2,
            min_score: None,
        }
    }
}

/// Which turn the topic-shift gate compares a new question against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReference {
    /// The most recent turn of either role
    #[default]
    LastTurn,
    /// The most recent user question
    LastQuestion,
}

/// Conversation memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Exchanges retained in memory
    pub window: usize,
    /// Cosine similarity below which memory is cleared
    pub topic_shift_threshold: f32,
    /// Turn used as the comparison reference
    pub reference: GateReference,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            window: 3,
            topic_shift_threshold: 0.15,
            reference: GateReference::LastTurn,
        }
    }
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama generation model name
    pub model: String,
    /// Ollama base URL
    pub host: String,
    /// Sampling temperature; runtime default when unset
    pub temperature: Option<f32>,
    /// Timeout in seconds for one generation
    pub timeout_seconds: u64,
    /// Stream tokens to the terminal while generating
    pub stream: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2:3b".to_owned(),
            host: DEFAULT_OLLAMA_HOST.to_owned(),
            temperature: None,
            timeout_seconds: 120,
            stream: true,
        }
    }
}

/// Prompt template configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Template with `{chat_history}`, `{context}` and `{question}` slots
    pub template: String,
    /// Estimated token budget for the rendered prompt
    pub max_prompt_tokens: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_owned(),
            max_prompt_tokens: 3072,
        }
    }
}

/// Session persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory for persisted sessions; `~/.docqa/sessions` when unset
    pub store_path: Option<PathBuf>,
}

impl AppConfig {
    /// Get the default config directory path (`~/.docqa`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".docqa"))
    }

    /// Get the default config file path (`~/.docqa/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory where sessions are persisted.
    ///
    /// # Errors
    /// Returns an error if no path is configured and the home directory
    /// cannot be determined
    pub fn sessions_dir(&self) -> Result<PathBuf> {
        match &self.session.store_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("sessions")),
        }
    }

    /// Load config from the default location, creating it with default values
    /// if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("Failed to read config: {error}")))?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {}: llm={}, embedding={}, index={}",
            path.display(),
            config.llm.model,
            config.embedding.model_name,
            config.index.path.display()
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|error| {
                Error::Config(format!("Failed to create config directory: {error}"))
            })?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# docqa configuration file\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))
            .map_err(|error| Error::Config(format!("Failed to write config: {error}")))?;

        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_OLLAMA_HOST) {
            self.embedding.host.clone_from(&host);
            self.llm.host = host;
        }
        if let Some(model) = lookup(ENV_LLM_MODEL) {
            self.llm.model = model;
        }
        if let Some(model) = lookup(ENV_EMBEDDING_MODEL) {
            self.embedding.model_name = model;
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first violated constraint
    pub fn validate(&self) -> Result<()> {
        if self.ingest.chunk_size == 0 {
            return Err(Error::Config("ingest.chunk_size must be positive".to_owned()));
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(Error::Config(format!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap, self.ingest.chunk_size
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be positive".to_owned()));
        }
        if self.memory.window == 0 {
            return Err(Error::Config("memory.window must be at least 1".to_owned()));
        }
        if !(-1.0..=1.0).contains(&self.memory.topic_shift_threshold) {
            return Err(Error::Config(format!(
                "memory.topic_shift_threshold ({}) must lie in [-1, 1]",
                self.memory.topic_shift_threshold
            )));
        }
        if self.llm.timeout_seconds == 0 {
            return Err(Error::Config("llm.timeout_seconds must be positive".to_owned()));
        }
        for slot in ["{chat_history}", "{context}", "{question}"] {
            if !self.prompt.template.contains(slot) {
                return Err(Error::Config(format!("prompt.template is missing the {slot} slot")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.ingest.chunk_size, 500);
        assert_eq!(config.ingest.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.memory.window, 3);
        assert!((config.memory.topic_shift_threshold - 0.15).abs() < f32::EPSILON);
        assert_eq!(config.llm.model, "llama3.2:3b");
        assert_eq!(config.embedding.device, Device::Cpu);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_content = r#"
[ingest]
chunk_size = 800
chunk_overlap = 100

[embedding]
device = "gpu"

[memory]
reference = "last_question"
"#;
        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.ingest.chunk_size, 800);
        assert_eq!(config.ingest.file_pattern, "*.pdf");
        assert_eq!(config.embedding.device, Device::Gpu);
        assert_eq!(config.embedding.model_name, "all-minilm");
        assert_eq!(config.memory.reference, GateReference::LastQuestion);
        assert_eq!(config.retrieval.top_k, 2);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.retrieval.min_score = Some(0.25);
        config.llm.temperature = Some(0.2);
        config.save_to_file(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# docqa configuration file"));

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.retrieval.min_score, Some(0.25));
        assert_eq!(loaded.llm.temperature, Some(0.2));
        assert_eq!(loaded.prompt.template, DEFAULT_PROMPT_TEMPLATE);
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller() {
        let mut config = AppConfig::default();
        config.ingest.chunk_overlap = config.ingest.chunk_size;
        let error = config.validate().unwrap_err();
        assert!(matches!(error, Error::Config(_)));
        assert!(error.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_validate_rejects_missing_slot() {
        let mut config = AppConfig::default();
        config.prompt.template = "Context: {context}\nQuestion: {question}".to_owned();
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("{chat_history}"));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = AppConfig::default();
        config.memory.topic_shift_threshold = 1.5;
        config.validate().unwrap_err();
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_OLLAMA_HOST, "http://gpu-box:11434"),
            (ENV_LLM_MODEL, "llama3.1:8b"),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides_from(|key| vars.get(key).map(|value| (*value).to_owned()));

        assert_eq!(config.llm.host, "http://gpu-box:11434");
        assert_eq!(config.embedding.host, "http://gpu-box:11434");
        assert_eq!(config.llm.model, "llama3.1:8b");
        assert_eq!(config.embedding.model_name, "all-minilm");
    }

    #[test]
    fn test_sessions_dir_prefers_configured_path() {
        let mut config = AppConfig::default();
        config.session.store_path = Some(PathBuf::from("/tmp/docqa-sessions"));
        assert_eq!(
            config.sessions_dir().unwrap(),
            PathBuf::from("/tmp/docqa-sessions")
        );
    }
}
