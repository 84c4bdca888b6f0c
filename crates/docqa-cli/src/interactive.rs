//! Interactive chat loop

use anyhow::Result;
use console::{Term, style};
use docqa_context::{EmbeddingProvider, Responder, SessionContext, SessionStore};
use docqa_core::AppConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, BufReader, stdin};
use uuid::Uuid;

use crate::utils::{format_failure, format_footer};

const WELCOME: &str = "Ask anything about your documents.";
const HELP: &str = "Commands: /reset clears the conversation, /help shows this, /exit quits.";

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'line> {
    Exit,
    Reset,
    Help,
    Empty,
    Unknown(&'line str),
    Question(&'line str),
}

fn parse_input(line: &str) -> ChatInput<'_> {
    let trimmed = line.trim();
    match trimmed {
        "" => ChatInput::Empty,
        "/exit" | "/quit" => ChatInput::Exit,
        "/reset" => ChatInput::Reset,
        "/help" => ChatInput::Help,
        command if command.starts_with('/') => ChatInput::Unknown(command),
        question => ChatInput::Question(question),
    }
}

/// Run the chat loop on stdin and stdout.
///
/// # Errors
/// Returns an error if the session cannot be opened or the terminal fails
pub async fn run_chat<E: EmbeddingProvider>(
    config: &AppConfig,
    responder: &Responder<E>,
    store: &mut dyn SessionStore,
    resume: Option<Uuid>,
) -> Result<()> {
    run_chat_with(
        config,
        responder,
        store,
        resume,
        BufReader::new(stdin()),
        &Term::stdout(),
    )
    .await
}

fn open_session(
    config: &AppConfig,
    store: &mut dyn SessionStore,
    resume: Option<Uuid>,
    term: &Term,
) -> Result<SessionContext> {
    let Some(id) = resume else {
        return Ok(store.create(config.memory.window)?);
    };
    let session = store.resume(id)?;
    term.write_line(&format!(
        "{}",
        style(format!(
            "Resumed session {id} ({} earlier turns)",
            session.memory.len()
        ))
        .dim()
    ))?;
    Ok(session)
}

async fn run_chat_with<E, R>(
    config: &AppConfig,
    responder: &Responder<E>,
    store: &mut dyn SessionStore,
    resume: Option<Uuid>,
    input: R,
    term: &Term,
) -> Result<()>
where
    E: EmbeddingProvider,
    R: AsyncBufRead + Unpin + Send,
{
    let mut session = open_session(config, store, resume, term)?;
    tracing::info!("=== Session {} started ===", session.id);

    term.write_line(&format!("{}", style(WELCOME).bold()))?;
    term.write_line(&format!("{}", style(HELP).dim()))?;

    let mut lines = input.lines();
    loop {
        term.write_str(&format!("{} ", style(">").cyan().bold()))?;
        let Some(line) = lines.next_line().await? else {
            term.write_line("")?;
            break;
        };

        let question = match parse_input(&line) {
            ChatInput::Exit => break,
            ChatInput::Empty => continue,
            ChatInput::Help => {
                term.write_line(HELP)?;
                continue;
            }
            ChatInput::Unknown(command) => {
                term.write_line(&format!("Unknown command {command}. {HELP}"))?;
                continue;
            }
            ChatInput::Reset => {
                session.memory.clear();
                save_session(store, &mut session);
                term.write_line(&format!("{}", style("Conversation cleared.").dim()))?;
                continue;
            }
            ChatInput::Question(question) => question,
        };

        let stream_term = term.clone();
        let streamed = Arc::new(AtomicBool::new(false));
        let stream_flag = Arc::clone(&streamed);
        let result = responder
            .answer_streaming(question, &mut session.memory, &move |token: &str| {
                stream_flag.store(true, Ordering::Relaxed);
                if let Err(error) = stream_term.write_str(token) {
                    tracing::debug!("Failed to write token: {error}");
                }
            })
            .await;

        match result {
            Ok(answer) => {
                term.write_line(&format_footer(&answer))?;
                if answer.memory_reset {
                    term.write_line(&format!(
                        "{}",
                        style("(new topic, earlier conversation set aside)").dim()
                    ))?;
                }
                save_session(store, &mut session);
            }
            Err(error) => {
                tracing::warn!("Failed to answer: {error}");
                let report = format_failure(&error, streamed.load(Ordering::Relaxed));
                term.write_line("")?;
                term.write_line(&format!("{}", style(report).red()))?;
            }
        }
    }

    tracing::info!("=== Session {} ended ===", session.id);
    Ok(())
}

fn save_session(store: &mut dyn SessionStore, session: &mut SessionContext) {
    if let Err(error) = store.save(session) {
        tracing::warn!("Failed to save session {}: {error}", session.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_context::{InMemorySessionStore, Ingestor, VocabularyEmbedder};
    use docqa_core::{Document, SourceRef};
    use docqa_local::MockModel;
    use std::sync::Arc;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  /exit "), ChatInput::Exit);
        assert_eq!(parse_input("/quit"), ChatInput::Exit);
        assert_eq!(parse_input("/reset"), ChatInput::Reset);
        assert_eq!(parse_input("/help"), ChatInput::Help);
        assert_eq!(parse_input("   "), ChatInput::Empty);
        assert_eq!(parse_input("/bogus"), ChatInput::Unknown("/bogus"));
        assert_eq!(
            parse_input(" What does the boss drop? "),
            ChatInput::Question("What does the boss drop?")
        );
    }

    async fn responder_for(model: &MockModel) -> Responder<VocabularyEmbedder> {
        let config = AppConfig::default();
        let embedder = VocabularyEmbedder::new(["boss", "drop", "drops", "souls", "life"]);
        let documents = [Document::new(
            "The boss drops Souls of Fright and has 28000 life.",
            SourceRef::page("data/Skeletron_Prime.pdf", 1),
        )];
        let index = Ingestor::new(embedder.clone(), &config)
            .unwrap()
            .build_index(&documents)
            .await
            .unwrap();
        Responder::new(embedder, Arc::new(model.clone()), Arc::new(index), &config).unwrap()
    }

    #[tokio::test]
    async fn test_chat_saves_each_exchange() {
        let model = MockModel::new().with_script(["The boss drops souls and has lots of life.", "28000 life."]);
        let responder = responder_for(&model).await;
        let mut store = InMemorySessionStore::new();
        let session = store.create(3).unwrap();
        let input: &[u8] = b"What does the boss drop?\n\nHow much life?\n/exit\nignored\n";

        run_chat_with(
            &AppConfig::default(),
            &responder,
            &mut store,
            Some(session.id),
            input,
            &Term::stdout(),
        )
        .await
        .unwrap();

        assert_eq!(model.call_count(), 2);
        let saved = store.resume(session.id).unwrap();
        assert_eq!(saved.memory.len(), 4);
        assert_eq!(saved.title(), Some("What does the boss drop?"));
    }

    #[tokio::test]
    async fn test_reset_command_clears_memory() {
        let model = MockModel::new().with_default_response("Souls of Fright.");
        let responder = responder_for(&model).await;
        let input: &[u8] = b"What does the boss drop?\n/reset\nWhat does the boss drop?\n";

        run_chat_with(
            &AppConfig::default(),
            &responder,
            &mut InMemorySessionStore::new(),
            None,
            input,
            &Term::stdout(),
        )
        .await
        .unwrap();

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(!prompts[1].contains("Souls of Fright."));
    }

    #[tokio::test]
    async fn test_failed_answer_keeps_chatting() {
        let model = MockModel::new();
        model.fail_with("runtime crashed");
        let responder = responder_for(&model).await;
        let input: &[u8] = b"What does the boss drop?\nHow much life?\n";

        run_chat_with(
            &AppConfig::default(),
            &responder,
            &mut InMemorySessionStore::new(),
            None,
            input,
            &Term::stdout(),
        )
        .await
        .unwrap();

        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_interrupted_answer_is_not_remembered() {
        let model = MockModel::new().with_default_response("The boss drops");
        model.fail_after_streaming("connection reset");
        let responder = responder_for(&model).await;
        let mut store = InMemorySessionStore::new();
        let session = store.create(3).unwrap();
        let input: &[u8] = b"What does the boss drop?\n/exit\n";

        run_chat_with(
            &AppConfig::default(),
            &responder,
            &mut store,
            Some(session.id),
            input,
            &Term::stdout(),
        )
        .await
        .unwrap();

        assert_eq!(model.call_count(), 1);
        assert!(store.resume(session.id).unwrap().memory.is_empty());
    }

    #[tokio::test]
    async fn test_resume_unknown_session_fails() {
        let model = MockModel::new();
        let responder = responder_for(&model).await;
        let input: &[u8] = b"";

        run_chat_with(
            &AppConfig::default(),
            &responder,
            &mut InMemorySessionStore::new(),
            Some(Uuid::new_v4()),
            input,
            &Term::stdout(),
        )
        .await
        .unwrap_err();
    }
}
