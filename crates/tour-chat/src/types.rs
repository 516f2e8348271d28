//! Data types shared across the chat crate.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CompletionError;
use crate::toggle::ToggleState;

/// Author of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message in the conversation.
///
/// Only [`crate::ConversationStore`] constructs turns, so `text` is never
/// blank and `created_at` never decreases along the history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub text: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Owned view of a session for a presentation layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub turns: Vec<Turn>,
    pub pending: bool,
    pub voice_state: ToggleState,
    pub speech_state: ToggleState,
}

impl SessionSnapshot {
    /// Whether the assistant is composing a reply to the latest user turn.
    pub fn is_composing(&self) -> bool {
        self.pending
    }

    pub fn latest(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// What an accepted or ignored `submit` call ended in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing was appended.
    Ignored,
    /// The completion service answered and its reply was appended.
    Replied(Turn),
    /// The completion failed; the fallback reply was appended instead.
    Fallback { turn: Turn, error: CompletionError },
    /// The session was closed while the request was in flight. The result was discarded.
    Cancelled,
}

impl SubmitOutcome {
    /// The assistant turn appended by this submission, if any.
    pub fn reply(&self) -> Option<&Turn> {
        match self {
            SubmitOutcome::Replied(turn) | SubmitOutcome::Fallback { turn, .. } => Some(turn),
            SubmitOutcome::Ignored | SubmitOutcome::Cancelled => None,
        }
    }
}
