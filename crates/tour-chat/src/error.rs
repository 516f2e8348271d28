//! Error types for the conversation pipeline.

/// Errors from the chat session.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("an exchange is already pending")]
    Busy,
    #[error("{0} is already active")]
    AlreadyActive(String),
    #[error("hook error: {0}")]
    Hook(#[from] HookError),
    #[error("session is closed")]
    SessionClosed,
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Failures of one completion request.
///
/// Returned by every [`crate::CompletionClient`]; the controller recovers all
/// of them into a fallback reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("completion service is not configured: {0}")]
    Configuration(String),
    #[error("completion request failed: {0}")]
    Network(String),
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Short stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Configuration(_) => "configuration",
            CompletionError::Network(_) => "network",
            CompletionError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Failure reported by a capture or playback hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
