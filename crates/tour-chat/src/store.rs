//! Ordered turn history for one chat session.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ChatError;
use crate::types::{Role, Turn};

/// Source of turn timestamps. Injected so ordering can be tested against a clock
/// that stalls or steps backwards.
pub type ClockFn = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Append-only history of turns, the source of truth for what is rendered.
///
/// Guarantees unique ids and non-decreasing timestamps in insertion order.
pub struct ConversationStore {
    turns: Vec<Turn>,
    clock: ClockFn,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("turns", &self.turns)
            .finish_non_exhaustive()
    }
}

impl ConversationStore {
    /// Create an empty store stamped by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Box::new(Utc::now))
    }

    pub fn with_clock(clock: ClockFn) -> Self {
        Self {
            turns: Vec::new(),
            clock,
        }
    }

    /// Construct and store a turn.
    ///
    /// Fails with `InvalidInput` when `text` is empty or all whitespace. If the
    /// clock reads earlier than the last stored turn, the last turn's timestamp
    /// is reused.
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> Result<Turn, ChatError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput(
                "message cannot be empty".to_string(),
            ));
        }

        let mut created_at = (self.clock)();
        if let Some(last) = self.turns.last() {
            if created_at < last.created_at {
                tracing::debug!(
                    clock = %created_at,
                    last = %last.created_at,
                    "Clock behind last turn, reusing previous timestamp"
                );
                created_at = last.created_at;
            }
        }

        let turn = Turn {
            id: Uuid::new_v4(),
            text,
            role,
            created_at,
        };
        self.turns.push(turn.clone());
        Ok(turn)
    }

    /// The most recently appended turn.
    pub fn latest(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// All turns in insertion order. Call again to restart.
    pub fn all(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
