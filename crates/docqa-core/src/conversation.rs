//! Conversation memory for a single chat session.
//!
//! Memory is an ordered list of role-tagged turns bounded to the last `window`
//! exchanges, where one exchange is a user turn followed by an assistant turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions
    User,
    /// The model answering them
    Assistant,
}

impl Role {
    /// Label used when serializing history into a prompt
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the message
    pub role: Role,
    /// Message text
    pub text: String,
    /// When the message was recorded
    pub at: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }

    /// Renders the turn as `Role: text`.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}: {}", self.role, self.text)
    }
}

/// Sliding-window conversation memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMemory {
    /// Turns in chronological order
    turns: Vec<Turn>,
    /// Maximum number of exchanges retained
    window: usize,
}

impl ConversationMemory {
    /// Default number of exchanges kept in memory.
    pub const DEFAULT_WINDOW: usize = 3;

    /// Creates empty memory keeping at most `window` exchanges (minimum 1).
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            turns: Vec::new(),
            window: window.max(1),
        }
    }

    /// Rebuilds memory from previously persisted turns, keeping only the tail
    /// that fits in the window.
    #[must_use]
    pub fn from_turns(window: usize, turns: Vec<Turn>) -> Self {
        let mut memory = Self::new(window);
        memory.turns = turns;
        memory.enforce_window();
        memory
    }

    /// Records a completed question/answer exchange.
    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, question));
        self.turns.push(Turn::new(Role::Assistant, answer));
        self.enforce_window();
    }

    /// Drops all turns.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Most recent turn of any role.
    #[must_use]
    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Most recent user turn.
    #[must_use]
    pub fn last_user_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|turn| turn.role == Role::User)
    }

    /// All turns in chronological order.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turns are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Configured window in exchanges.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    fn enforce_window(&mut self) {
        let max_turns = self.window * 2;
        if self.turns.len() > max_turns {
            let excess = self.turns.len() - max_turns;
            self.turns.drain(..excess);
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
