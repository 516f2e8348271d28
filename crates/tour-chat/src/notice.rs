//! One-shot notices surfaced to the user and to observability.

use std::fmt;

use crate::error::{CompletionError, HookError};

/// Something the presentation layer should tell the user about, or that
/// operators want in their logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No API credential is configured. Sent at most once per session.
    MissingCredential,
    /// A completion failed and the fallback reply was shown instead.
    CompletionFailed(CompletionError),
    /// Voice capture failed; the toggle is already back to Idle.
    VoiceFailed(HookError),
    /// Speech playback failed; the toggle is already back to Idle.
    SpeechFailed(HookError),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::MissingCredential => write!(f, "请配置 OpenAI API Key"),
            Notice::CompletionFailed(e) => write!(f, "AI 回复失败: {}", e),
            Notice::VoiceFailed(_) => write!(f, "语音输入出现问题，请稍后再试"),
            Notice::SpeechFailed(_) => write!(f, "语音播报出现问题，请稍后再试"),
        }
    }
}

/// Receives notices. Implementations must not call back into the controller.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sink that records each notice as a tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::MissingCredential => {
                tracing::warn!("Completion credential missing");
            }
            Notice::CompletionFailed(e) => {
                tracing::warn!(kind = e.kind(), error = %e, "Completion failed, fallback shown");
            }
            Notice::VoiceFailed(e) => {
                tracing::warn!(error = %e, "Voice capture failed");
            }
            Notice::SpeechFailed(e) => {
                tracing::warn!(error = %e, "Speech playback failed");
            }
        }
    }
}

impl<F> NoticeSink for F
where
    F: Fn(Notice) + Send + Sync,
{
    fn notify(&self, notice: Notice) {
        self(notice)
    }
}
