use core::result::Result as CoreResult;
use docqa_core::Error as CoreError;
use thiserror::Error;

/// Result type for local runtime operations.
pub type Result<T> = CoreResult<T, LocalError>;

/// Failures talking to the Ollama runtime.
#[derive(Debug, Error)]
pub enum LocalError {
    /// Error surfaced from the core crate.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The runtime could not be reached.
    #[error("Ollama not available: {0}")]
    OllamaUnavailable(String),

    /// The requested model is not installed.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Pulling a model failed.
    #[error("Model pull failed: {0}")]
    ModelPullFailed(String),

    /// The runtime answered with an error during generation.
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

impl From<LocalError> for CoreError {
    fn from(error: LocalError) -> Self {
        match error {
            LocalError::Core(inner) => inner,
            LocalError::Http(inner) => Self::Request(inner),
            LocalError::Json(inner) => Self::Json(inner),
            LocalError::OllamaUnavailable(message)
            | LocalError::ModelNotFound(message)
            | LocalError::ModelPullFailed(message)
            | LocalError::InferenceFailed(message) => Self::Generation(message),
        }
    }
}
