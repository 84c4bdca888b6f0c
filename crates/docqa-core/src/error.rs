use core::result::Result as CoreResult;
use std::io::Error as IoError;

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur anywhere in the ingestion and query pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The specified file or directory does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// A source document could not be read or parsed.
    #[error("Document error: {0}")]
    Document(String),

    /// The embedding model could not be loaded or reached.
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// The embedding backend rejected the input or returned malformed output.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A query with `k > 0` was issued against an index with no entries.
    #[error("Vector index is empty")]
    EmptyIndex,

    /// The persisted index is unreadable or internally inconsistent.
    #[error("Vector index is corrupt: {0}")]
    IndexCorrupt(String),

    /// A vector does not match the dimensionality of the index.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality fixed by the index.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// Retrieval over the vector index failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// The language model call failed or timed out.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Returns `true` for transient errors like network failures, generation
    /// timeouts, or a model runtime that is still starting.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::Generation(_) | Self::ModelUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as JsonValue, from_str};
    use std::io;

    #[test]
    fn test_error_display() {
        let error1 = Error::Config("chunk_overlap must be smaller".to_owned());
        assert_eq!(
            error1.to_string(),
            "Configuration error: chunk_overlap must be smaller"
        );

        let error2 = Error::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(
            error2.to_string(),
            "Embedding dimension mismatch: expected 384, got 768"
        );

        assert_eq!(Error::EmptyIndex.to_string(), "Vector index is empty");
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(Error::Generation("timed out".to_owned()).is_retryable());
        assert!(Error::ModelUnavailable("connection refused".to_owned()).is_retryable());

        assert!(!Error::Config("bad config".to_owned()).is_retryable());
        assert!(!Error::IndexCorrupt("truncated".to_owned()).is_retryable());
        assert!(!Error::EmptyIndex.is_retryable());
    }

    #[test]
    fn test_error_from_io() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_error = from_str::<JsonValue>("invalid json").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Json(_)));
    }
}
