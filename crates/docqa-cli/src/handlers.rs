//! Command handlers for CLI operations

use anyhow::{Context as _, Result, bail};
use console::{Term, style};
use docqa_context::{
    EmbeddingProvider as _, FileSessionStore, InMemorySessionStore, Ingestor,
    OllamaEmbeddingClient, Responder, SessionStore, load_index_async,
};
use docqa_core::{AppConfig, ConversationMemory, Error, LanguageModel as _};
use docqa_local::LocalModelProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::cli::SessionAction;
use crate::interactive::run_chat;
use crate::utils::{PARTIAL_ANSWER_DISCARDED, format_answer, format_footer, format_skipped};

/// Check the model runtime and make sure both models are installed.
///
/// # Errors
/// Returns an error if Ollama is not reachable or a model cannot be pulled
async fn ensure_models(
    provider: &LocalModelProvider,
    embedder: &OllamaEmbeddingClient,
) -> Result<()> {
    if !provider.is_available().await {
        bail!(
            "Ollama is not reachable at {}. Start it with `ollama serve` and try again.",
            provider.manager().base_url()
        );
    }
    provider
        .manager()
        .ensure_model(provider.model_name())
        .await
        .with_context(|| format!("Model '{}' is not available", provider.model_name()))?;
    embedder.ensure_model_available().await?;
    Ok(())
}

/// Load the index and wire up the responder and the generation model.
///
/// # Errors
/// Returns an error if the index is missing or corrupt, or the models are
/// unavailable
async fn build_responder(config: &AppConfig) -> Result<Responder<OllamaEmbeddingClient>> {
    let embedder = OllamaEmbeddingClient::from_config(&config.embedding)?;
    let provider = LocalModelProvider::from_config(&config.llm);
    ensure_models(&provider, &embedder).await?;

    let index = match load_index_async(config.index.path.clone()).await {
        Ok(index) => index,
        Err(Error::FileNotFound(_)) => bail!(
            "No index found at {}. Run `docqa ingest` first.",
            config.index.path.display()
        ),
        Err(error) => return Err(error.into()),
    };
    if index.model() != embedder.model_name() {
        tracing::warn!(
            "Index was built with '{}' but queries use '{}'; rerun `docqa ingest`",
            index.model(),
            embedder.model_name()
        );
    }
    tracing::info!(
        "Loaded index with {} chunks from {}",
        index.len(),
        config.index.path.display()
    );

    Ok(Responder::new(
        embedder,
        Arc::new(provider),
        Arc::new(index),
        config,
    )?)
}

/// Handle `docqa ingest`
///
/// # Errors
/// Returns an error if loading, embedding, or saving the index fails
pub async fn handle_ingest(
    mut config: AppConfig,
    data: Option<PathBuf>,
    pattern: Option<String>,
    index: Option<PathBuf>,
) -> Result<()> {
    if let Some(data) = data {
        config.ingest.data_path = data;
    }
    if let Some(pattern) = pattern {
        config.ingest.file_pattern = pattern;
    }
    if let Some(index) = index {
        config.index.path = index;
    }

    let term = Term::stdout();
    let embedder = OllamaEmbeddingClient::from_config(&config.embedding)?;
    term.write_line(&format!(
        "{}",
        style(format!("Checking embedding model '{}'...", embedder.model_name())).dim()
    ))?;
    embedder.ensure_model_available().await?;

    let progress_term = Term::stderr();
    let ingestor = Ingestor::new(embedder, &config)?.with_progress_callback(Arc::new(
        move |stage: &str, current: u64, total: Option<u64>| {
            let line = match total {
                Some(total) => format!("{stage}: {current}/{total}"),
                None => format!("{stage}..."),
            };
            if let Err(error) = progress_term.write_line(&line) {
                tracing::debug!("Failed to write progress: {error}");
            }
        },
    ));

    let report = ingestor.run().await?;

    term.write_line(&format!(
        "{} {} chunks from {} pages in {} files ({}-dimensional) in {:.1}s",
        style("✓ Indexed").green(),
        report.chunks,
        report.documents,
        report.files,
        report.dimension,
        report.elapsed.as_secs_f64()
    ))?;
    term.write_line(&format!("  index: {}", report.index_path.display()))?;
    if !report.skipped.is_empty() {
        term.write_line(&format!(
            "{}",
            style(format!("{} file(s) skipped:", report.skipped.len())).yellow()
        ))?;
        for line in format_skipped(&report.skipped) {
            term.write_line(&line)?;
        }
    }

    Ok(())
}

/// Handle `docqa ask`
///
/// # Errors
/// Returns an error if the responder cannot be built or answering fails
pub async fn handle_ask(
    config: &AppConfig,
    question: &str,
    top_k: Option<usize>,
    no_stream: bool,
) -> Result<()> {
    let mut responder = build_responder(config).await?;
    if let Some(top_k) = top_k {
        responder = responder.with_top_k(top_k);
    }

    let term = Term::stdout();
    let mut memory = ConversationMemory::new(config.memory.window);

    if no_stream || !config.llm.stream {
        let answer = responder.answer(question, &mut memory).await?;
        term.write_line(&format_answer(&answer))?;
        return Ok(());
    }

    let stream_term = term.clone();
    let streamed = Arc::new(AtomicBool::new(false));
    let stream_flag = Arc::clone(&streamed);
    let result = responder
        .answer_streaming(question, &mut memory, &move |token: &str| {
            stream_flag.store(true, Ordering::Relaxed);
            if let Err(error) = stream_term.write_str(token) {
                tracing::debug!("Failed to write token: {error}");
            }
        })
        .await;
    let answer = match result {
        Ok(answer) => answer,
        Err(error) => {
            if streamed.load(Ordering::Relaxed) {
                term.write_line("")?;
                Term::stderr().write_line(PARTIAL_ANSWER_DISCARDED)?;
            }
            return Err(error.into());
        }
    };
    term.write_line(&format_footer(&answer))?;
    tracing::debug!(
        "Answered in {}ms using {} tokens",
        answer.latency_ms,
        answer.usage.total()
    );

    Ok(())
}

/// Handle `docqa chat`
///
/// # Errors
/// Returns an error if the responder or session store cannot be set up
pub async fn handle_chat(config: &AppConfig, session: Option<Uuid>, ephemeral: bool) -> Result<()> {
    let responder = build_responder(config).await?;
    let mut store: Box<dyn SessionStore> = if ephemeral {
        Box::new(InMemorySessionStore::new())
    } else {
        Box::new(FileSessionStore::new(config.sessions_dir()?)?)
    };
    run_chat(config, &responder, store.as_mut(), session).await
}

/// Handle `docqa sessions`
///
/// # Errors
/// Returns an error if the session store cannot be read or written
pub fn handle_sessions(config: &AppConfig, action: SessionAction) -> Result<()> {
    let mut store = FileSessionStore::new(config.sessions_dir()?)?;
    let term = Term::stdout();

    match action {
        SessionAction::List => {
            let sessions = store.list()?;
            if sessions.is_empty() {
                term.write_line("No saved sessions.")?;
            }
            for session in sessions {
                term.write_line(&format!(
                    "{}  {}  {:>2} turns  {}",
                    style(session.id).cyan(),
                    session.updated_at.format("%Y-%m-%d %H:%M"),
                    session.memory.len(),
                    session.title().unwrap_or("(empty)")
                ))?;
            }
        }
        SessionAction::Delete { id } => {
            store.destroy(id)?;
            term.write_line(&format!("Deleted session {id}"))?;
        }
    }

    Ok(())
}
