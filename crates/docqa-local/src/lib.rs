//! Local language model access through Ollama.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Test allows"
    )
)]

/// Errors raised while talking to the local runtime.
pub mod error;
/// Ollama-backed [`docqa_core::LanguageModel`].
pub mod inference;
/// Runtime availability and model management.
pub mod manager;
/// Scripted model for tests and offline runs.
pub mod mock;
/// Ollama wire types.
pub mod models;

pub use error::{LocalError, Result};
pub use inference::LocalModelProvider;
pub use manager::OllamaManager;
pub use mock::MockModel;
pub use models::{GenerateOptions, OllamaGenerateRequest, OllamaGenerateResponse, OllamaModel};
