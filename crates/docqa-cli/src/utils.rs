//! Utility functions for CLI operations

use anyhow::{Context as _, Result};
use docqa_context::{Answer, NO_SOURCES_NOTICE, SkippedFile};
use docqa_core::{AppConfig, Error};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Printed when a streamed answer fails after some of it was shown
pub const PARTIAL_ANSWER_DISCARDED: &str = "(answer interrupted, the text above was discarded)";

const DEFAULT_LOG_FILTER: &str = "docqa_context=info,docqa_local=info,docqa_cli=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into())
}

/// Log to stderr, leaving stdout for answers.
pub fn init_stderr_logging() {
    Registry::default()
        .with(env_filter())
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

/// Log to `debug.log` inside `state_dir`, replacing any previous log.
///
/// # Errors
/// Returns an error if the directory or log file cannot be created
pub fn init_file_logging(state_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(state_dir)
        .with_context(|| format!("Failed to create {}", state_dir.display()))?;

    let debug_log = state_dir.join("debug.log");
    if debug_log.exists() {
        fs::remove_file(&debug_log)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&debug_log)?;

    Registry::default()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(Arc::new(log_file))
                .with_ansi(false)
                .with_target(true)
                .with_level(true),
        )
        .init();

    Ok(debug_log)
}

/// Load configuration from `explicit` or the default location, then apply
/// environment overrides.
///
/// # Errors
/// Returns an error if an explicitly named file cannot be loaded, or the
/// final configuration is invalid
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = match explicit {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load_or_create().unwrap_or_else(|error| {
            tracing::warn!("Failed to load config from ~/.docqa/config.toml: {error}");
            tracing::warn!("Using default configuration");
            AppConfig::default()
        }),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Directory for logs and other per-user state.
///
/// # Errors
/// Returns an error if the home directory cannot be determined
pub fn state_dir() -> Result<PathBuf> {
    Ok(AppConfig::config_dir()?)
}

/// Everything printed after the answer text: the no-sources notice or the
/// distinct sources used.
pub fn format_footer(answer: &Answer) -> String {
    if !answer.has_sources {
        return format!("\n{NO_SOURCES_NOTICE}");
    }
    let mut output = "\n\nSources:".to_owned();
    for source in answer.source_refs() {
        output.push_str(&format!("\n  - {source}"));
    }
    output
}

/// Answer text followed by its footer.
pub fn format_answer(answer: &Answer) -> String {
    format!("{}{}", answer.text, format_footer(answer))
}

/// Report for a failed question. `streamed` marks that part of an answer
/// already reached the terminal and must be disowned.
pub fn format_failure(error: &Error, streamed: bool) -> String {
    let mut output = String::new();
    if streamed {
        output.push_str(&format!("\n{PARTIAL_ANSWER_DISCARDED}\n"));
    }
    output.push_str(&format!("Error: {error}"));
    if error.is_retryable() {
        output.push_str("\nThis may be temporary, try asking again.");
    }
    output
}

/// One line per file that could not be loaded.
pub fn format_skipped(skipped: &[SkippedFile]) -> Vec<String> {
    skipped
        .iter()
        .map(|file| format!("  skipped {}: {}", file.path.display(), file.reason))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::{Chunk, ScoredChunk, SourceRef, TokenUsage};
    use tempfile::TempDir;

    fn answer(sources: Vec<ScoredChunk>) -> Answer {
        Answer {
            text: "Souls of Fright.".to_owned(),
            has_sources: !sources.is_empty(),
            sources,
            memory_reset: false,
            usage: TokenUsage::default(),
            latency_ms: 12,
        }
    }

    fn scored(page: u32, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                text: "The boss drops Souls of Fright.".to_owned(),
                source: SourceRef::page("data/Skeletron_Prime.pdf", page),
                index: 0,
                overlap: 0,
            },
            score,
        }
    }

    #[test]
    fn test_format_answer_lists_sources_once() {
        let formatted = format_answer(&answer(vec![scored(2, 0.9), scored(2, 0.8), scored(3, 0.5)]));
        assert_eq!(
            formatted,
            "Souls of Fright.\n\nSources:\n  - data/Skeletron_Prime.pdf (page 2)\n  - data/Skeletron_Prime.pdf (page 3)"
        );
    }

    #[test]
    fn test_format_answer_without_sources() {
        let formatted = format_answer(&answer(Vec::new()));
        assert_eq!(formatted, "Souls of Fright.\nNo sources found.");
    }

    #[test]
    fn test_format_failure_disowns_streamed_text() {
        let error = Error::Generation("connection reset".to_owned());
        assert_eq!(
            format_failure(&error, true),
            format!(
                "\n{PARTIAL_ANSWER_DISCARDED}\nError: Generation failed: connection reset\nThis may be temporary, try asking again."
            )
        );
    }

    #[test]
    fn test_format_failure_before_any_output() {
        let error = Error::Retrieval("index is corrupt".to_owned());
        assert_eq!(
            format_failure(&error, false),
            "Error: Retrieval failed: index is corrupt"
        );
    }

    #[test]
    fn test_format_skipped() {
        let lines = format_skipped(&[SkippedFile {
            path: PathBuf::from("data/broken.pdf"),
            reason: "not a PDF".to_owned(),
        }]);
        assert_eq!(lines, vec!["  skipped data/broken.pdf: not a PDF"]);
    }

    #[test]
    fn test_load_explicit_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let mut expected = AppConfig::default();
        expected.retrieval.top_k = 5;
        expected.save_to_file(&path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.retrieval.top_k, 5);
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let temp = TempDir::new().unwrap();
        load_config(Some(&temp.path().join("absent.toml"))).unwrap_err();
    }
}
