use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a piece of text came from: a file and, for paginated formats, a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Path of the source file
    pub path: PathBuf,
    /// 1-indexed page number, if the format is paginated
    pub page: Option<u32>,
}

impl SourceRef {
    /// Creates a reference to a whole, unpaginated file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            page: None,
        }
    }

    /// Creates a reference to one page of a file.
    pub fn page(path: impl Into<PathBuf>, page: u32) -> Self {
        Self {
            path: path.into(),
            page: Some(page),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(formatter, "{} (page {page})", self.path.display()),
            None => write!(formatter, "{}", self.path.display()),
        }
    }
}

/// Raw document text with its source metadata. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Full text of the document (or page)
    pub text: String,
    /// Origin of the text
    pub source: SourceRef,
}

impl Document {
    /// Creates a new document.
    pub fn new(text: impl Into<String>, source: SourceRef) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// A bounded, overlapping slice of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text, including any overlap carried over from the previous chunk
    pub text: String,
    /// Document this chunk was cut from
    pub source: SourceRef,
    /// Position of this chunk within its document (0-based)
    pub index: usize,
    /// Number of leading characters repeated from the previous chunk
    pub overlap: usize,
}

impl Chunk {
    /// Text of this chunk without the carried-over overlap prefix.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((offset, _)) => &self.text[offset..],
            None => "",
        }
    }

    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk returned from a similarity query, with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Matched chunk
    pub chunk: Chunk,
    /// Cosine similarity to the query vector
    pub score: f32,
}

/// Token accounting reported by a language model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub input: u64,
    /// Tokens generated
    pub output: u64,
}

impl TokenUsage {
    /// Prompt and generated tokens together.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}
