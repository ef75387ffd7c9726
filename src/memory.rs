//! Conversation Memory
//!
//! Bounded, append-only log of turns. Old turns are evicted from the front once
//! the capacity is reached; prompt context always comes from the sliding-window
//! accessor, never from ad-hoc slicing at call sites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// SQL behind an assistant answer, kept for auditability.
    pub executed_query: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn record_user(&mut self, content: &str) {
        self.push(ConversationTurn {
            role: Role::User,
            content: content.to_string(),
            executed_query: None,
            created_at: Utc::now(),
        });
    }

    pub fn record_assistant(&mut self, content: &str, executed_query: Option<String>) {
        self.push(ConversationTurn {
            role: Role::Assistant,
            content: content.to_string(),
            executed_query,
            created_at: Utc::now(),
        });
    }

    fn push(&mut self, turn: ConversationTurn) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip)
    }

    /// Render the last `n` turns as "role: content" lines for prompt context.
    pub fn render_window(&self, n: usize) -> String {
        self.recent(n)
            .map(|t| format!("{}: {}", t.role.label(), t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
