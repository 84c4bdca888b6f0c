//! Coverage and size properties of document chunking.

use docqa_context::split_documents;
use docqa_core::{Chunk, Document, Error, SourceRef};

fn document(text: &str) -> Document {
    Document::new(text, SourceRef::page("data/Skeletron_Prime.pdf", 1))
}

fn assert_covers(text: &str, chunks: &[Chunk], chunk_size: usize) {
    let rebuilt: String = chunks.iter().map(Chunk::fresh_text).collect();
    assert_eq!(rebuilt, text, "fresh text must reproduce the document");

    let total: usize = chunks.iter().map(Chunk::char_len).sum();
    assert!(total >= text.chars().count());

    for chunk in chunks {
        assert!(chunk.fresh_text().chars().count() <= chunk_size);
    }
}

fn sample_texts() -> Vec<String> {
    vec![
        "Skeletron Prime is a Hardmode boss.".to_owned(),
        "abcdefghi ".repeat(100),
        "Paragraph one is here.\n\nParagraph two follows.\nWith a second line. And a sentence."
            .repeat(12),
        "x".repeat(1234),
        "Ünïcödé wörds ünd 日本語のテキスト ".repeat(40),
        "line\n".repeat(300),
    ]
}

#[test]
fn every_character_is_covered() {
    for (chunk_size, overlap) in [(500, 50), (100, 0), (64, 63), (7, 3)] {
        for text in sample_texts() {
            let chunks = split_documents(&[document(&text)], chunk_size, overlap).unwrap();
            assert!(!chunks.is_empty());
            assert_covers(&text, &chunks, chunk_size);
        }
    }
}

#[test]
fn overlap_repeats_previous_tail() {
    let text = "Paragraph one is here.\n\nParagraph two follows.".repeat(30);
    let chunks = split_documents(&[document(&text)], 120, 20).unwrap();

    for pair in chunks.windows(2) {
        let [previous, next] = pair else {
            panic!("windows(2) yields pairs");
        };
        let carried: String = next.text.chars().take(next.overlap).collect();
        assert!(previous.text.ends_with(&carried));
        assert_eq!(next.overlap, 20);
    }
}

#[test]
fn thousand_characters_make_two_chunks() {
    let text = "abcdefghi ".repeat(100);
    assert_eq!(text.chars().count(), 1000);

    let chunks = split_documents(&[document(&text)], 500, 50).unwrap();
    assert_eq!(chunks.len(), 2);

    let first_tail: String = chunks[0].text.chars().skip(450).collect();
    let second_head: String = chunks[1].text.chars().take(50).collect();
    assert_eq!(first_tail, second_head);
}

#[test]
fn chunk_length_is_fresh_size_plus_overlap() {
    let text = "abcdefghi ".repeat(200);
    let chunks = split_documents(&[document(&text)], 500, 50).unwrap();

    let lengths: Vec<usize> = chunks.iter().map(Chunk::char_len).collect();
    assert_eq!(lengths, vec![500, 550, 550, 550]);
    for chunk in &chunks {
        assert_eq!(chunk.fresh_text().chars().count(), 500);
        assert!(chunk.char_len() <= 500 + 50);
    }
}

#[test]
fn chunk_indices_restart_per_document() {
    let long = "word ".repeat(60);
    let documents = [document(&long), document(&long)];
    let chunks = split_documents(&documents, 100, 10).unwrap();

    let indices: Vec<usize> = chunks.iter().map(|chunk| chunk.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 0, 1, 2]);
}

#[test]
fn overlap_must_be_smaller_than_chunk_size() {
    let error = split_documents(&[document("text")], 50, 60).unwrap_err();
    assert!(matches!(error, Error::Config(_)));
}
