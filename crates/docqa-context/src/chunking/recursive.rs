//! Recursive separator splitting.
//!
//! Text is cut on the coarsest separator first; any piece still longer than
//! the chunk size is cut again on the next finer separator, bottoming out in
//! raw character slicing. Separators stay attached to the piece they end, so
//! the pieces concatenate back to the input exactly.

use std::mem;

/// Separators tried in order, coarsest first.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Splits `text` into segments of at most `chunk_size` characters.
///
/// Adjacent pieces are merged greedily while the merged segment still fits.
/// Concatenating the returned segments reproduces `text`.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    collect_pieces(text, chunk_size, &SEPARATORS, &mut pieces);
    merge_pieces(pieces, chunk_size)
}

fn collect_pieces<'text>(
    text: &'text str,
    chunk_size: usize,
    separators: &[&str],
    out: &mut Vec<&'text str>,
) {
    if text.chars().count() <= chunk_size {
        out.push(text);
        return;
    }

    let Some((separator, finer)) = separators.split_first() else {
        slice_chars(text, chunk_size, out);
        return;
    };

    for part in text.split_inclusive(separator) {
        collect_pieces(part, chunk_size, finer, out);
    }
}

fn slice_chars<'text>(text: &'text str, chunk_size: usize, out: &mut Vec<&'text str>) {
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in text.char_indices() {
        if count == chunk_size {
            out.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
}

fn merge_pieces(pieces: Vec<&str>, chunk_size: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for piece in pieces {
        let piece_len = piece.chars().count();
        if current_len + piece_len > chunk_size && !current.is_empty() {
            segments.push(mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(piece);
        current_len += piece_len;
    }
    if !current.is_empty() {
        segments.push(current);
    }

    segments
}
