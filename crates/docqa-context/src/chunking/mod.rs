//! Splitting documents into overlapping chunks on natural text boundaries.

mod recursive;

use docqa_core::{Chunk, Document, Error, Result};
use tracing::debug;

pub use recursive::{SEPARATORS, split_text};

/// Estimate tokens from text (rough: ~4 chars per token)
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.len();
    let words = text.split_whitespace().count();
    // Average of character-based and word-based estimates
    let char_estimate = chars / 4;
    let word_estimate = (words * 10) / 13;
    usize::midpoint(char_estimate, word_estimate)
}

/// Checks that `chunk_size > overlap`, with a non-zero chunk size.
///
/// # Errors
/// Returns `Error::Config` when the bounds are unusable
pub fn validate_bounds(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::Config("chunk_size must be greater than 0".to_owned()));
    }
    if overlap >= chunk_size {
        return Err(Error::Config(format!(
            "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Splits every document into chunks of at most `chunk_size` fresh characters.
///
/// Each chunk after the first in a document is prefixed with the last
/// `overlap` characters of its predecessor. Chunks never span documents, and
/// documents containing only whitespace produce no chunks.
///
/// # Errors
/// Returns `Error::Config` if `overlap >= chunk_size` or `chunk_size == 0`
pub fn split_documents(
    documents: &[Document],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    validate_bounds(chunk_size, overlap)?;

    let mut chunks = Vec::new();
    for document in documents {
        if document.text.trim().is_empty() {
            debug!("Skipping blank document {}", document.source);
            continue;
        }

        let segments = split_text(&document.text, chunk_size);
        let mut previous: Option<&str> = None;
        for (index, segment) in segments.iter().enumerate() {
            let carried = previous.map_or("", |prev| tail_chars(prev, overlap));
            chunks.push(Chunk {
                text: format!("{carried}{segment}"),
                source: document.source.clone(),
                index,
                overlap: carried.chars().count(),
            });
            previous = Some(segment);
        }
    }

    Ok(chunks)
}

/// Last `count` characters of `text` (all of it when shorter).
fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    let total = text.chars().count();
    if total <= count {
        return text;
    }
    text.char_indices()
        .nth(total - count)
        .map_or("", |(offset, _)| &text[offset..])
}
