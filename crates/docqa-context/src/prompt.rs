//! Prompt template with named slots and a token budget.
//!
//! The template holds `{chat_history}`, `{context}` and `{question}` slots.
//! When the filled prompt exceeds the budget, content is removed in this
//! order until it fits:
//! 1. oldest history turns
//! 2. lowest-ranked context chunks, keeping the best one
//! 3. the tail of the remaining context text
//!
//! The question itself is never shortened.

use docqa_core::{Error, Result, ScoredChunk, Turn};
use regex::{Captures, Regex};
use tracing::debug;

use crate::chunking::estimate_tokens;

/// Slot receiving the rendered conversation history
pub const HISTORY_SLOT: &str = "chat_history";
/// Slot receiving the retrieved context
pub const CONTEXT_SLOT: &str = "context";
/// Slot receiving the user's question
pub const QUESTION_SLOT: &str = "question";

const CONTEXT_SEPARATOR: &str = "\n\n";

/// A rendered prompt and what went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// Final prompt text
    pub text: String,
    /// How many of the offered chunks (best first) made it in
    pub chunks_included: usize,
    /// How many of the most recent history turns made it in
    pub turns_included: usize,
    /// Whether anything had to be cut to fit the budget
    pub truncated: bool,
}

/// Prompt template with `{chat_history}`, `{context}` and `{question}` slots.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    slot_pattern: Regex,
}

impl PromptTemplate {
    /// Parses a template, requiring all three slots.
    ///
    /// # Errors
    /// Returns `Error::Config` if a slot is missing
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let slot_pattern = Regex::new(r"\{(chat_history|context|question)\}")
            .map_err(|error| Error::Config(format!("Invalid slot pattern: {error}")))?;

        for slot in [HISTORY_SLOT, CONTEXT_SLOT, QUESTION_SLOT] {
            let present = slot_pattern
                .captures_iter(&template)
                .any(|captures| captures.get(1).is_some_and(|name| name.as_str() == slot));
            if !present {
                return Err(Error::Config(format!(
                    "Prompt template is missing the {{{slot}}} slot"
                )));
            }
        }

        Ok(Self {
            template,
            slot_pattern,
        })
    }

    /// Raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Fills the slots verbatim.
    #[must_use]
    pub fn fill(&self, history: &str, context: &str, question: &str) -> String {
        self.slot_pattern
            .replace_all(&self.template, |captures: &Captures<'_>| {
                match captures.get(1).map(|name| name.as_str()) {
                    Some(HISTORY_SLOT) => history.to_owned(),
                    Some(CONTEXT_SLOT) => context.to_owned(),
                    Some(QUESTION_SLOT) => question.to_owned(),
                    _ => captures
                        .get(0)
                        .map_or_else(String::new, |whole| whole.as_str().to_owned()),
                }
            })
            .into_owned()
    }

    /// Renders the prompt within `max_tokens`, truncating as described in the
    /// module docs.
    pub fn render(
        &self,
        question: &str,
        history: &[Turn],
        chunks: &[ScoredChunk],
        max_tokens: usize,
    ) -> RenderedPrompt {
        let mut first_turn = 0;
        let mut chunk_count = chunks.len();

        loop {
            let history_text = render_turns(history.get(first_turn..).unwrap_or_default());
            let context_text = render_context(chunks.get(..chunk_count).unwrap_or_default());
            let text = self.fill(&history_text, &context_text, question);

            if estimate_tokens(&text) <= max_tokens {
                return RenderedPrompt {
                    text,
                    chunks_included: chunk_count,
                    turns_included: history.len() - first_turn,
                    truncated: first_turn > 0 || chunk_count < chunks.len(),
                };
            }

            if first_turn < history.len() {
                first_turn += 1;
            } else if chunk_count > 1 {
                chunk_count -= 1;
            } else {
                break;
            }
        }

        let context_text = render_context(chunks.get(..chunk_count).unwrap_or_default());
        let kept = self.longest_fitting_prefix(&context_text, question, max_tokens);
        debug!(
            "Prompt over budget, context cut to {kept} of {} chars",
            context_text.chars().count()
        );
        let context_prefix = char_prefix(&context_text, kept);
        RenderedPrompt {
            text: self.fill("", context_prefix, question),
            chunks_included: if context_prefix.trim().is_empty() {
                0
            } else {
                chunk_count
            },
            turns_included: 0,
            truncated: true,
        }
    }

    /// Largest char count of `context` that keeps the prompt within budget.
    fn longest_fitting_prefix(&self, context: &str, question: &str, max_tokens: usize) -> usize {
        let fits = |chars: usize| {
            estimate_tokens(&self.fill("", char_prefix(context, chars), question)) <= max_tokens
        };

        let mut low = 0;
        let mut high = context.chars().count();
        while low < high {
            let mid = low + (high - low).div_ceil(2);
            if fits(mid) {
                low = mid;
            } else {
                high = mid - 1;
            }
        }
        low
    }
}

fn render_turns(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(Turn::render)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|scored| scored.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

fn char_prefix(text: &str, chars: usize) -> &str {
    text.char_indices()
        .nth(chars)
        .map_or(text, |(offset, _)| &text[..offset])
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::config::DEFAULT_PROMPT_TEMPLATE;
    use docqa_core::{Chunk, Role, SourceRef};

    const TEMPLATE: &str = "History: {chat_history}\nContext: {context}\nQuestion: {question}";

    fn scored(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                text: text.to_owned(),
                source: SourceRef::page("boss.pdf", 1),
                index: 0,
                overlap: 0,
            },
            score,
        }
    }

    fn turns(count: usize) -> Vec<Turn> {
        (0..count)
            .map(|idx| {
                let role = if idx % 2 == 0 {
                    Role::User
                } else {
                    Role::Assistant
                };
                Turn::new(role, format!("turn number {idx} with some padding words"))
            })
            .collect()
    }

    #[test]
    fn test_missing_slot_is_rejected() {
        let error = PromptTemplate::new("Context: {context}\nQuestion: {question}").unwrap_err();
        assert!(matches!(error, Error::Config(ref message) if message.contains("chat_history")));
    }

    #[test]
    fn test_default_template_parses() {
        let template = PromptTemplate::new(DEFAULT_PROMPT_TEMPLATE).unwrap();
        let text = template.fill("h", "c", "q");
        assert!(text.contains("Question: q"));
        assert!(!text.contains("{question}"));
    }

    #[test]
    fn test_fill_leaves_other_braces_alone() {
        let template = PromptTemplate::new(format!("{{json}} {TEMPLATE}")).unwrap();
        let text = template.fill("h", "c", "q");
        assert!(text.starts_with("{json} History: h"));
    }

    #[test]
    fn test_render_within_budget() {
        let template = PromptTemplate::new(TEMPLATE).unwrap();
        let rendered = template.render(
            "What does it drop?",
            &turns(2),
            &[scored("Souls of Fright.", 0.9), scored("28000 life.", 0.5)],
            1000,
        );

        assert!(!rendered.truncated);
        assert_eq!(rendered.chunks_included, 2);
        assert_eq!(rendered.turns_included, 2);
        assert!(rendered.text.contains("Souls of Fright.\n\n28000 life."));
        assert!(rendered.text.contains("User: turn number 0"));
    }

    #[test]
    fn test_history_dropped_before_context() {
        let template = PromptTemplate::new(TEMPLATE).unwrap();
        let history = turns(6);
        let chunks = [scored("Souls of Fright.", 0.9)];
        let full = template.render("q", &history, &chunks, 10_000);
        let budget = estimate_tokens(&full.text) - 10;

        let rendered = template.render("q", &history, &chunks, budget);
        assert!(rendered.truncated);
        assert!(rendered.turns_included < 6);
        assert_eq!(rendered.chunks_included, 1);
        assert!(!rendered.text.contains("turn number 0"));
        assert!(rendered.text.contains("Souls of Fright."));
    }

    #[test]
    fn test_lowest_ranked_chunks_dropped_next() {
        let template = PromptTemplate::new(TEMPLATE).unwrap();
        let best = "best chunk ".repeat(20);
        let worst = "worst chunk ".repeat(20);
        let chunks = [scored(&best, 0.9), scored(&worst, 0.1)];
        let budget = estimate_tokens(&template.fill("", &best, "q")) + 2;

        let rendered = template.render("q", &turns(2), &chunks, budget);
        assert_eq!(rendered.turns_included, 0);
        assert_eq!(rendered.chunks_included, 1);
        assert!(rendered.text.contains("best chunk"));
        assert!(!rendered.text.contains("worst chunk"));
    }

    #[test]
    fn test_hard_truncation_keeps_question() {
        let template = PromptTemplate::new(TEMPLATE).unwrap();
        let long = "lengthy context sentence ".repeat(200);
        let question = "What is the capital of France?";
        let budget = 60;

        let rendered = template.render(question, &[], &[scored(&long, 0.9)], budget);
        assert!(rendered.truncated);
        assert!(rendered.text.ends_with(question));
        assert!(estimate_tokens(&rendered.text) <= budget);
        assert!(rendered.text.contains("lengthy context"));
    }

    #[test]
    fn test_char_prefix() {
        assert_eq!(char_prefix("héllo", 2), "hé");
        assert_eq!(char_prefix("héllo", 10), "héllo");
        assert_eq!(char_prefix("héllo", 0), "");
    }
}
