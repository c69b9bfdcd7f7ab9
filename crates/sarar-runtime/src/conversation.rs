//! Bounded conversation memory.
//!
//! A [`ConversationHistory`] always starts with exactly one system
//! [`Turn`] (the persona) followed by user/assistant pairs.  It never holds
//! more than `1 + 2 × max_exchanges` turns; the oldest pairs are dropped
//! first and the system turn is never dropped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exchanges kept unless configured otherwise.
pub const DEFAULT_MAX_EXCHANGES: usize = 10;

/// Speaker of a [`Turn`].  Serializes to the chat-API role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// The chat-API role name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the conversation.  Also the wire shape of a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered, bounded list of turns.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    max_exchanges: usize,
}

impl ConversationHistory {
    pub fn new(system_prompt: impl Into<String>, max_exchanges: usize) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
            max_exchanges,
        }
    }

    /// All turns, system turn first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn system(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Never true: the system turn is always present.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_exchanges(&self) -> usize {
        self.max_exchanges
    }

    /// Upper bound on [`len`][Self::len].
    pub fn capacity(&self) -> usize {
        1 + 2 * self.max_exchanges
    }

    /// Append one user turn and one assistant turn, then trim.
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.turns.push(Turn::user(user));
        self.turns.push(Turn::assistant(assistant));
        self.trim();
    }

    /// Drop every exchange, keeping the system turn.
    pub fn clear(&mut self) {
        self.turns.truncate(1);
    }

    fn trim(&mut self) {
        let cap = self.capacity();
        if self.turns.len() > cap {
            let excess = self.turns.len() - cap;
            self.turns.drain(1..1 + excess);
        }
    }
}
