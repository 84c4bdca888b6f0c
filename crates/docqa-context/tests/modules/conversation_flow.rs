//! End-to-end question answering over a small index with scripted models.

use docqa_context::{
    EmbeddingProvider as _, FileSessionStore, Ingestor, Responder, SessionStore as _,
    VectorIndex, VocabularyEmbedder, load_index,
};
use docqa_core::{AppConfig, ConversationMemory, Document, Error, SourceRef};
use docqa_local::MockModel;
use std::sync::Arc;
use tempfile::TempDir;

const VOCABULARY: [&str; 8] = [
    "boss", "drop", "drops", "life", "souls", "capital", "france", "laser",
];

fn guide() -> Vec<Document> {
    vec![
        Document::new(
            "Skeletron Prime is a mechanical boss. The boss drops Souls of Fright.",
            SourceRef::page("data/Skeletron_Prime.pdf", 1),
        ),
        Document::new(
            "Skeletron Prime has 28000 life in Classic mode and fires a laser.",
            SourceRef::page("data/Skeletron_Prime.pdf", 2),
        ),
    ]
}

async fn build_responder(
    temp: &TempDir,
    model: &MockModel,
) -> (Responder<VocabularyEmbedder>, VocabularyEmbedder) {
    let mut config = AppConfig::default();
    config.index.path = temp.path().join("db");
    let embedder = VocabularyEmbedder::new(VOCABULARY);

    let ingestor = Ingestor::new(embedder.clone(), &config).unwrap();
    let index = ingestor.build_index(&guide()).await.unwrap();
    docqa_context::save_index(&index, &config.index.path).unwrap();
    let index = Arc::new(load_index(&config.index.path).unwrap());

    let responder =
        Responder::new(embedder.clone(), Arc::new(model.clone()), index, &config).unwrap();
    (responder, embedder)
}

#[tokio::test]
async fn same_topic_keeps_memory_and_new_topic_resets_it() {
    let temp = TempDir::new().unwrap();
    let model = MockModel::new().with_script([
        "The boss drops souls and has lots of life.",
        "It has 28000 life.",
        "Paris.",
    ]);
    let (responder, _) = build_responder(&temp, &model).await;
    let mut memory = ConversationMemory::default();

    let first = responder
        .answer("What does the boss drop?", &mut memory)
        .await
        .unwrap();
    assert!(!first.memory_reset);
    assert!(first.has_sources);
    assert_eq!(memory.len(), 2);

    let second = responder
        .answer("How much life does it have?", &mut memory)
        .await
        .unwrap();
    assert!(!second.memory_reset);
    assert!(second.has_sources);
    assert_eq!(memory.len(), 4);
    assert!(model.prompts()[1].contains("What does the boss drop?"));

    let third = responder
        .answer("What is the capital of France?", &mut memory)
        .await
        .unwrap();
    assert!(third.memory_reset);
    assert!(!third.has_sources);
    assert_eq!(third.display_text(), "Paris.\nNo sources found.");
    assert_eq!(memory.len(), 2);
    assert_eq!(
        memory.last_user_turn().map(|turn| turn.text.as_str()),
        Some("What is the capital of France?")
    );
    assert!(!model.prompts()[2].contains("How much life"));
}

#[tokio::test]
async fn unmatched_question_has_no_sources() {
    let temp = TempDir::new().unwrap();
    let model = MockModel::new().with_default_response("I could not find that.");
    let (responder, _) = build_responder(&temp, &model).await;

    let answer = responder
        .answer("What is the capital of France?", &mut ConversationMemory::default())
        .await
        .unwrap();
    assert!(!answer.has_sources);
    assert!(answer.sources.is_empty());
}

#[tokio::test]
async fn empty_index_still_answers() {
    let model = MockModel::new().with_default_response("No idea.");
    let responder = Responder::new(
        VocabularyEmbedder::new(VOCABULARY),
        Arc::new(model.clone()),
        Arc::new(VectorIndex::empty("vocabulary")),
        &AppConfig::default(),
    )
    .unwrap();

    let mut memory = ConversationMemory::default();
    let answer = responder
        .answer("What does the boss drop?", &mut memory)
        .await
        .unwrap();
    assert!(!answer.has_sources);
    assert_eq!(memory.len(), 2);
}

#[tokio::test]
async fn failures_leave_memory_untouched() {
    let temp = TempDir::new().unwrap();
    let model = MockModel::new().with_default_response("Souls.");
    let (responder, embedder) = build_responder(&temp, &model).await;

    let mut memory = ConversationMemory::default();
    responder
        .answer("What does the boss drop?", &mut memory)
        .await
        .unwrap();
    let before = memory.clone();

    model.fail_with("runtime crashed");
    let generation_error = responder
        .answer("How much life does it have?", &mut memory)
        .await
        .unwrap_err();
    assert!(matches!(generation_error, Error::Generation(_)));
    assert_eq!(memory, before);

    model.recover();
    embedder.fail_with("embedding runtime offline");
    let retrieval_error = responder
        .answer("How much life does it have?", &mut memory)
        .await
        .unwrap_err();
    assert!(matches!(retrieval_error, Error::Retrieval(_)));
    assert_eq!(memory, before);
    assert!(embedder.ensure_model_available().await.is_err());
}

#[tokio::test]
async fn resumed_session_continues_the_conversation() {
    let temp = TempDir::new().unwrap();
    let model = MockModel::new().with_script([
        "The boss drops souls and has lots of life.",
        "It has 28000 life.",
    ]);
    let (responder, _) = build_responder(&temp, &model).await;
    let mut store = FileSessionStore::new(temp.path().join("sessions")).unwrap();

    let mut session = store.create(3).unwrap();
    responder
        .answer("What does the boss drop?", &mut session.memory)
        .await
        .unwrap();
    store.save(&mut session).unwrap();

    let mut resumed = store.resume(session.id).unwrap();
    let answer = responder
        .answer("How much life does it have?", &mut resumed.memory)
        .await
        .unwrap();
    assert!(!answer.memory_reset);
    assert_eq!(resumed.memory.len(), 4);
}
