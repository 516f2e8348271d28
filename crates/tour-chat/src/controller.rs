//! Session controller: the component a presentation layer binds to.
//!
//! Accepts user input, appends it to the history, runs exactly one
//! completion at a time, and appends either the reply or the fallback.
//! Voice and speech toggles run alongside and never touch the history.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tour_core::config::{ChatConfig, TourConfig};
use tour_core::SpotContext;

use crate::completion::{build_persona, CompletionClient};
use crate::error::{ChatError, CompletionError, HookError};
use crate::notice::{Notice, NoticeSink, TracingNoticeSink};
use crate::store::ConversationStore;
use crate::toggle::{CaptureHook, PlaybackHook, SpeechToggle, ToggleState, VoiceToggle};
use crate::types::{Role, SessionSnapshot, SubmitOutcome, Turn};

/// Per-session behaviour resolved from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub greeting: String,
    pub fallback_reply: String,
    pub locale: String,
    pub auto_speak: bool,
    pub max_message_chars: usize,
    pub request_timeout: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &TourConfig, spot: &SpotContext) -> Self {
        let fallback_reply = if config.chat.fallback_reply.trim().is_empty() {
            ChatConfig::default().fallback_reply
        } else {
            config.chat.fallback_reply.clone()
        };
        Self {
            greeting: config.chat.greeting_for(&spot.name),
            fallback_reply,
            locale: config.chat.locale.clone(),
            auto_speak: config.chat.auto_speak,
            max_message_chars: config.chat.max_message_chars,
            request_timeout: Duration::from_secs(config.completion.request_timeout_secs.max(1)),
        }
    }
}

/// Mutable state of one chat screen.
#[derive(Debug)]
struct Session {
    store: ConversationStore,
    pending: bool,
}

/// Owns one session and orchestrates the store, the completion client, and the toggles.
pub struct SessionController {
    spot: SpotContext,
    persona: String,
    settings: SessionSettings,
    session: Mutex<Session>,
    client: Arc<dyn CompletionClient>,
    voice: VoiceToggle,
    speech: SpeechToggle,
    notices: Arc<dyn NoticeSink>,
    cancel: CancellationToken,
    credential_notice_sent: AtomicBool,
    updates: watch::Sender<SessionSnapshot>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("spot", &self.spot.name)
            .field("voice", &self.voice)
            .field("speech", &self.speech)
            .field("closed", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Open a session for `spot`. The history starts with the greeting turn.
    pub fn new(
        spot: SpotContext,
        mut settings: SessionSettings,
        client: Arc<dyn CompletionClient>,
        capture: Arc<dyn CaptureHook>,
        playback: Arc<dyn PlaybackHook>,
    ) -> Self {
        if settings.fallback_reply.trim().is_empty() {
            tracing::warn!("Blank fallback reply configured, using the default");
            settings.fallback_reply = ChatConfig::default().fallback_reply;
        }

        let mut store = ConversationStore::new();
        if let Err(e) = store.append(Role::Assistant, settings.greeting.as_str()) {
            tracing::warn!(error = %e, "Greeting template rendered empty, starting without greeting");
        }

        let voice = VoiceToggle::new(capture, settings.locale.clone());
        let speech = SpeechToggle::new(playback);
        let initial = SessionSnapshot {
            turns: store.all().cloned().collect(),
            pending: false,
            voice_state: ToggleState::Idle,
            speech_state: ToggleState::Idle,
        };
        let (updates, _) = watch::channel(initial);

        tracing::info!(spot = %spot.name, "Chat session opened");

        Self {
            persona: build_persona(&spot),
            spot,
            settings,
            session: Mutex::new(Session {
                store,
                pending: false,
            }),
            client,
            voice,
            speech,
            notices: Arc::new(TracingNoticeSink),
            cancel: CancellationToken::new(),
            credential_notice_sent: AtomicBool::new(false),
            updates,
        }
    }

    /// Route notices to `sink` instead of the log.
    pub fn with_notice_sink(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.notices = sink;
        self
    }

    // -- Submit pipeline --

    /// Submit one user message.
    ///
    /// Blank input is ignored. While an exchange is pending the call is
    /// rejected with `Busy` and nothing is appended. Completion failures are
    /// recovered into the fallback reply; they never surface as `Err`.
    pub async fn submit(&self, raw_input: &str) -> Result<SubmitOutcome, ChatError> {
        if self.cancel.is_cancelled() {
            return Err(ChatError::SessionClosed);
        }

        let text = raw_input.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring blank submission");
            return Ok(SubmitOutcome::Ignored);
        }
        if text.chars().count() > self.settings.max_message_chars {
            return Err(ChatError::InvalidInput(format!(
                "message exceeds maximum length of {} characters",
                self.settings.max_message_chars
            )));
        }

        let (user_turn, history) = {
            let mut session = self.lock_session();
            if session.pending {
                tracing::warn!("Submission rejected, exchange already pending");
                return Err(ChatError::Busy);
            }
            let history: Vec<Turn> = session.store.all().cloned().collect();
            let turn = session.store.append(Role::User, text)?;
            session.pending = true;
            (turn, history)
        };
        tracing::info!(turn_id = %user_turn.id, chars = text.chars().count(), "User turn accepted");
        self.publish();
        let mut guard = ExchangeGuard {
            controller: self,
            turn_id: user_turn.id,
            armed: true,
        };

        let request = tokio::time::timeout(
            self.settings.request_timeout,
            self.client.complete(&self.persona, &history, text),
        );
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            res = request => Some(match res {
                Ok(inner) => inner,
                Err(_) => Err(CompletionError::Network(format!(
                    "no response within {}s",
                    self.settings.request_timeout.as_secs()
                ))),
            }),
        };
        guard.disarm();
        let Some(result) = result.filter(|_| !self.cancel.is_cancelled()) else {
            tracing::info!(turn_id = %user_turn.id, "Session closed during completion, result discarded");
            return Ok(SubmitOutcome::Cancelled);
        };

        let result = result.and_then(|reply| {
            if reply.trim().is_empty() {
                Err(CompletionError::MalformedResponse(
                    "completion returned empty text".to_string(),
                ))
            } else {
                Ok(reply)
            }
        });

        match result {
            Ok(reply) => {
                let turn = self.finish_exchange(&reply)?;
                tracing::info!(turn_id = %turn.id, chars = turn.text.chars().count(), "Assistant reply appended");
                self.publish();
                if self.settings.auto_speak {
                    self.speak_reply(&turn.text);
                }
                Ok(SubmitOutcome::Replied(turn))
            }
            Err(error) => {
                let turn = self.finish_exchange(&self.settings.fallback_reply)?;
                tracing::warn!(
                    turn_id = %turn.id,
                    kind = error.kind(),
                    error = %error,
                    "Completion failed, fallback reply appended"
                );
                self.publish();
                self.report_completion_failure(&error);
                Ok(SubmitOutcome::Fallback { turn, error })
            }
        }
    }

    /// Append the assistant turn and close the pending window in one step.
    fn finish_exchange(&self, text: &str) -> Result<Turn, ChatError> {
        let mut session = self.lock_session();
        session.pending = false;
        session.store.append(Role::Assistant, text)
    }

    fn speak_reply(&self, text: &str) {
        match self.speech.start(text) {
            Ok(()) => self.publish(),
            Err(ChatError::Hook(e)) => self.notices.notify(Notice::SpeechFailed(e)),
            Err(e) => tracing::warn!(error = %e, "Reply playback not started"),
        }
    }

    fn report_completion_failure(&self, error: &CompletionError) {
        if matches!(error, CompletionError::Configuration(_)) {
            if !self.credential_notice_sent.swap(true, Ordering::SeqCst) {
                self.notices.notify(Notice::MissingCredential);
            }
        } else {
            self.notices.notify(Notice::CompletionFailed(error.clone()));
        }
    }

    // -- Toggles --

    /// Start or stop voice capture. Independent of the pending exchange.
    pub fn toggle_voice(&self) -> Result<ToggleState, ChatError> {
        self.ensure_open()?;
        let result = self.voice.toggle();
        if let Err(ChatError::Hook(e)) = &result {
            self.notices.notify(Notice::VoiceFailed(e.clone()));
        }
        self.publish();
        result
    }

    /// Start speaking `text`, or stop the current playback.
    pub fn toggle_speech(&self, text: &str) -> Result<ToggleState, ChatError> {
        self.ensure_open()?;
        let result = self.speech.toggle(text);
        if let Err(ChatError::Hook(e)) = &result {
            self.notices.notify(Notice::SpeechFailed(e.clone()));
        }
        self.publish();
        result
    }

    /// The capture engine finished on its own.
    pub fn on_voice_finished(&self) {
        if self.voice.on_hook_finished() {
            self.publish();
        }
    }

    /// The capture engine failed. Voice is Idle before the notice goes out.
    pub fn on_voice_error(&self, error: HookError) {
        let error = self.voice.on_hook_error(error);
        self.publish();
        self.notices.notify(Notice::VoiceFailed(error));
    }

    pub fn on_speech_finished(&self) {
        if self.speech.on_hook_finished() {
            self.publish();
        }
    }

    /// The playback engine failed. Speech is Idle before the notice goes out.
    pub fn on_speech_error(&self, error: HookError) {
        let error = self.speech.on_hook_error(error);
        self.publish();
        self.notices.notify(Notice::SpeechFailed(error));
    }

    // -- Teardown --

    /// Tear the session down. An in-flight completion is discarded and
    /// active toggles are stopped. Later submissions fail with `SessionClosed`.
    pub fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        for (name, result) in [("voice", self.voice.stop()), ("speech", self.speech.stop())] {
            if let Err(e) = result {
                tracing::warn!(toggle = name, error = %e, "Stop on close failed");
            }
        }
        tracing::info!(spot = %self.spot.name, "Chat session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn ensure_open(&self) -> Result<(), ChatError> {
        if self.cancel.is_cancelled() {
            Err(ChatError::SessionClosed)
        } else {
            Ok(())
        }
    }

    // -- Presentation --

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_of(&self.lock_session())
    }

    fn snapshot_of(&self, session: &Session) -> SessionSnapshot {
        SessionSnapshot {
            turns: session.store.all().cloned().collect(),
            pending: session.pending,
            voice_state: self.voice.state(),
            speech_state: self.speech.state(),
        }
    }

    /// Receive a fresh snapshot after every change.
    ///
    /// Publishing waits for outstanding borrows, so do not call into the
    /// controller while holding one.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.lock_session().store.all().cloned().collect()
    }

    pub fn latest(&self) -> Option<Turn> {
        self.lock_session().store.latest().cloned()
    }

    pub fn is_pending(&self) -> bool {
        self.lock_session().pending
    }

    pub fn voice_state(&self) -> ToggleState {
        self.voice.state()
    }

    pub fn speech_state(&self) -> ToggleState {
        self.speech.state()
    }

    pub fn spot(&self) -> &SpotContext {
        &self.spot
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Snapshot and send under the session lock so published states never go backwards.
    fn publish(&self) {
        let session = self.lock_session();
        self.updates.send_replace(self.snapshot_of(&session));
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e: PoisonError<_>| {
            tracing::error!("Session lock poisoned, recovering");
            e.into_inner()
        })
    }
}

/// Closes an accepted exchange whose `submit` future was dropped before the
/// completion resolved. The user turn gets the fallback reply and `pending`
/// is cleared. A closed session is left untouched.
struct ExchangeGuard<'a> {
    controller: &'a SessionController,
    turn_id: Uuid,
    armed: bool,
}

impl ExchangeGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed || self.controller.cancel.is_cancelled() {
            return;
        }
        let controller = self.controller;
        match controller.finish_exchange(&controller.settings.fallback_reply) {
            Ok(reply) => tracing::warn!(
                turn_id = %self.turn_id,
                reply_id = %reply.id,
                "Submission dropped before completion, fallback reply appended"
            ),
            Err(e) => tracing::error!(turn_id = %self.turn_id, error = %e, "Failed to close dropped exchange"),
        }
        controller.publish();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================
