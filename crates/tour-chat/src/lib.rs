//! Conversational session engine for the tour guide.
//!
//! Owns the ordered turn history of one chat screen, drives a single-flight
//! request/response cycle against an OpenAI-compatible completion service,
//! and coordinates the voice capture and speech playback toggles.

pub mod completion;
pub mod controller;
pub mod error;
pub mod notice;
pub mod store;
pub mod toggle;
pub mod types;

pub use completion::{build_persona, CompletionClient, OpenAiCompletionClient};
pub use controller::{SessionController, SessionSettings};
pub use error::{ChatError, CompletionError, HookError};
pub use notice::{Notice, NoticeSink, TracingNoticeSink};
pub use store::{ClockFn, ConversationStore};
pub use toggle::{
    CaptureHook, PlaybackHook, SpeechToggle, ToggleState, ToggleStateMachine, VoiceToggle,
};
pub use types::{Role, SessionSnapshot, SubmitOutcome, Turn};
