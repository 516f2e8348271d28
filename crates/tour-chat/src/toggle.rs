//! Voice capture and speech playback toggles.
//!
//! Each toggle is a strict two-state machine guarding one long-running
//! external side effect:
//! - Idle -> Active (start; invokes the start hook)
//! - Active -> Idle (stop; invokes the stop hook)
//! - Active -> Idle (hook finished or failed; no hook call)
//!
//! A start while Active is rejected without touching the hook. A hook
//! failure always leaves the toggle Idle before the error is handed back.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, HookError};

/// State of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleState {
    Idle,
    Active,
}

impl fmt::Display for ToggleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleState::Idle => write!(f, "Idle"),
            ToggleState::Active => write!(f, "Active"),
        }
    }
}

impl ToggleState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &ToggleState) -> bool {
        matches!(
            (self, target),
            (ToggleState::Idle, ToggleState::Active) | (ToggleState::Active, ToggleState::Idle)
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ToggleState::Active)
    }
}

/// Shared two-state flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct ToggleStateMachine {
    name: &'static str,
    state: Arc<Mutex<ToggleState>>,
}

impl ToggleStateMachine {
    /// Create a state machine initialized to `Idle`.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(ToggleState::Idle)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the current state.
    pub fn current(&self) -> ToggleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempt to transition to `target`.
    ///
    /// On rejection the state is unchanged and the current state is returned.
    pub fn transition(&self, target: ToggleState) -> Result<(), ToggleState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(&target) {
            tracing::debug!(toggle = self.name, "{} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(*state)
        }
    }

    /// Force the state back to Idle, returning the state it was in.
    pub fn reset(&self) -> ToggleState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        if previous.is_active() {
            tracing::warn!(toggle = self.name, "Toggle reset to Idle from {}", previous);
        }
        *state = ToggleState::Idle;
        previous
    }

    /// Idle -> Active, then run `hook`. A hook failure resets to Idle before returning.
    fn activate_with(
        &self,
        hook: impl FnOnce() -> Result<(), HookError>,
    ) -> Result<(), ChatError> {
        if self.transition(ToggleState::Active).is_err() {
            return Err(ChatError::AlreadyActive(self.name.to_string()));
        }
        if let Err(e) = hook() {
            self.reset();
            tracing::warn!(toggle = self.name, error = %e, "Start hook failed");
            return Err(e.into());
        }
        Ok(())
    }

    /// Active -> Idle, then run `hook`. Returns `false` without calling the hook when already Idle.
    fn deactivate_with(
        &self,
        hook: impl FnOnce() -> Result<(), HookError>,
    ) -> Result<bool, ChatError> {
        if self.transition(ToggleState::Idle).is_err() {
            return Ok(false);
        }
        if let Err(e) = hook() {
            tracing::warn!(toggle = self.name, error = %e, "Stop hook failed");
            return Err(e.into());
        }
        Ok(true)
    }

    /// Active -> Idle without calling any hook. Returns whether a transition happened.
    fn finish(&self) -> bool {
        self.transition(ToggleState::Idle).is_ok()
    }
}

// =============================================================================
// Hooks
// =============================================================================

/// Platform speech-to-text engine.
///
/// Both calls return once the engine has accepted the command; completion and
/// failures arrive later through the controller's `on_voice_*` methods.
pub trait CaptureHook: Send + Sync {
    fn start(&self, locale: &str) -> Result<(), HookError>;
    fn stop(&self) -> Result<(), HookError>;
}

/// Platform text-to-speech engine.
pub trait PlaybackHook: Send + Sync {
    fn start(&self, text: &str) -> Result<(), HookError>;
    fn stop(&self) -> Result<(), HookError>;
}

// =============================================================================
// VoiceToggle
// =============================================================================

/// Guards voice capture. Listening is `Active`.
pub struct VoiceToggle {
    machine: ToggleStateMachine,
    hook: Arc<dyn CaptureHook>,
    locale: String,
}

impl fmt::Debug for VoiceToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceToggle")
            .field("state", &self.machine.current())
            .field("locale", &self.locale)
            .finish()
    }
}

impl VoiceToggle {
    pub fn new(hook: Arc<dyn CaptureHook>, locale: impl Into<String>) -> Self {
        Self {
            machine: ToggleStateMachine::new("voice capture"),
            hook,
            locale: locale.into(),
        }
    }

    pub fn state(&self) -> ToggleState {
        self.machine.current()
    }

    /// A handle observing the same state.
    pub fn state_machine(&self) -> ToggleStateMachine {
        self.machine.clone()
    }

    /// Start listening. Fails with `AlreadyActive` while listening.
    pub fn start(&self) -> Result<(), ChatError> {
        self.machine.activate_with(|| self.hook.start(&self.locale))
    }

    /// Stop listening. A no-op returning `false` while Idle.
    pub fn stop(&self) -> Result<bool, ChatError> {
        self.machine.deactivate_with(|| self.hook.stop())
    }

    /// Stop when listening, start otherwise. Returns the resulting state.
    pub fn toggle(&self) -> Result<ToggleState, ChatError> {
        if self.state().is_active() {
            self.stop()?;
        } else {
            self.start()?;
        }
        Ok(self.state())
    }

    /// The engine finished capturing on its own.
    pub fn on_hook_finished(&self) -> bool {
        self.machine.finish()
    }

    /// The engine failed. The toggle is Idle when this returns.
    pub fn on_hook_error(&self, error: HookError) -> HookError {
        self.machine.reset();
        error
    }
}

// =============================================================================
// SpeechToggle
// =============================================================================

/// Guards speech playback. Speaking is `Active`.
pub struct SpeechToggle {
    machine: ToggleStateMachine,
    hook: Arc<dyn PlaybackHook>,
}

impl fmt::Debug for SpeechToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechToggle")
            .field("state", &self.machine.current())
            .finish()
    }
}

impl SpeechToggle {
    pub fn new(hook: Arc<dyn PlaybackHook>) -> Self {
        Self {
            machine: ToggleStateMachine::new("speech playback"),
            hook,
        }
    }

    pub fn state(&self) -> ToggleState {
        self.machine.current()
    }

    pub fn state_machine(&self) -> ToggleStateMachine {
        self.machine.clone()
    }

    /// Start speaking `text`. Fails with `AlreadyActive` while speaking.
    pub fn start(&self, text: &str) -> Result<(), ChatError> {
        self.machine.activate_with(|| self.hook.start(text))
    }

    pub fn stop(&self) -> Result<bool, ChatError> {
        self.machine.deactivate_with(|| self.hook.stop())
    }

    /// Stop when speaking, otherwise start speaking `text`.
    pub fn toggle(&self, text: &str) -> Result<ToggleState, ChatError> {
        if self.state().is_active() {
            self.stop()?;
        } else {
            self.start(text)?;
        }
        Ok(self.state())
    }

    /// Playback reached the end of the text.
    pub fn on_hook_finished(&self) -> bool {
        self.machine.finish()
    }

    pub fn on_hook_error(&self, error: HookError) -> HookError {
        self.machine.reset();
        error
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHook {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: AtomicBool,
        fail_stop: AtomicBool,
        last_arg: Mutex<String>,
    }

    impl CountingHook {
        fn record_start(&self, arg: &str) -> Result<(), HookError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            *self.last_arg.lock().unwrap() = arg.to_string();
            if self.fail_start.load(Ordering::SeqCst) {
                Err(HookError::new("engine unavailable"))
            } else {
                Ok(())
            }
        }

        fn record_stop(&self) -> Result<(), HookError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop.load(Ordering::SeqCst) {
                Err(HookError::new("engine stuck"))
            } else {
                Ok(())
            }
        }
    }

    impl CaptureHook for CountingHook {
        fn start(&self, locale: &str) -> Result<(), HookError> {
            self.record_start(locale)
        }
        fn stop(&self) -> Result<(), HookError> {
            self.record_stop()
        }
    }

    impl PlaybackHook for CountingHook {
        fn start(&self, text: &str) -> Result<(), HookError> {
            self.record_start(text)
        }
        fn stop(&self) -> Result<(), HookError> {
            self.record_stop()
        }
    }

    fn voice() -> (VoiceToggle, Arc<CountingHook>) {
        let hook = Arc::new(CountingHook::default());
        (VoiceToggle::new(hook.clone(), "zh-CN"), hook)
    }

    fn speech() -> (SpeechToggle, Arc<CountingHook>) {
        let hook = Arc::new(CountingHook::default());
        (SpeechToggle::new(hook.clone()), hook)
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ToggleState::Idle.to_string(), "Idle");
        assert_eq!(ToggleState::Active.to_string(), "Active");
    }

    #[test]
    fn test_valid_and_invalid_transitions() {
        assert!(ToggleState::Idle.can_transition_to(&ToggleState::Active));
        assert!(ToggleState::Active.can_transition_to(&ToggleState::Idle));
        assert!(!ToggleState::Idle.can_transition_to(&ToggleState::Idle));
        assert!(!ToggleState::Active.can_transition_to(&ToggleState::Active));
    }

    #[test]
    fn test_state_machine_rejection_reports_current() {
        let sm = ToggleStateMachine::new("test");
        assert_eq!(sm.transition(ToggleState::Idle), Err(ToggleState::Idle));
        sm.transition(ToggleState::Active).unwrap();
        assert_eq!(sm.transition(ToggleState::Active), Err(ToggleState::Active));
    }

    #[test]
    fn test_state_machine_clone_is_shared() {
        let sm1 = ToggleStateMachine::new("test");
        let sm2 = sm1.clone();
        sm1.transition(ToggleState::Active).unwrap();
        assert_eq!(sm2.current(), ToggleState::Active);
        assert_eq!(sm2.reset(), ToggleState::Active);
        assert_eq!(sm1.current(), ToggleState::Idle);
    }

    #[test]
    fn test_voice_start_invokes_hook_with_locale() {
        let (toggle, hook) = voice();
        toggle.start().unwrap();
        assert_eq!(toggle.state(), ToggleState::Active);
        assert_eq!(hook.starts.load(Ordering::SeqCst), 1);
        assert_eq!(*hook.last_arg.lock().unwrap(), "zh-CN");
    }

    #[test]
    fn test_voice_double_start_is_rejected_without_second_hook_call() {
        let (toggle, hook) = voice();
        toggle.start().unwrap();
        let result = toggle.start();
        assert!(matches!(result, Err(ChatError::AlreadyActive(_))));
        assert_eq!(hook.starts.load(Ordering::SeqCst), 1);
        assert_eq!(toggle.state(), ToggleState::Active);
    }

    #[test]
    fn test_voice_stop_while_idle_is_noop() {
        let (toggle, hook) = voice();
        assert!(!toggle.stop().unwrap());
        assert_eq!(hook.stops.load(Ordering::SeqCst), 0);
        assert_eq!(toggle.state(), ToggleState::Idle);
    }

    #[test]
    fn test_voice_start_stop_start() {
        let (toggle, hook) = voice();
        toggle.start().unwrap();
        assert!(toggle.stop().unwrap());
        toggle.start().unwrap();
        assert_eq!(hook.starts.load(Ordering::SeqCst), 2);
        assert_eq!(hook.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_start_hook_leaves_idle() {
        let (toggle, hook) = voice();
        hook.fail_start.store(true, Ordering::SeqCst);
        let result = toggle.start();
        assert!(matches!(result, Err(ChatError::Hook(_))));
        assert_eq!(toggle.state(), ToggleState::Idle);

        hook.fail_start.store(false, Ordering::SeqCst);
        toggle.start().unwrap();
        assert_eq!(toggle.state(), ToggleState::Active);
    }

    #[test]
    fn test_failed_stop_hook_still_idle() {
        let (toggle, hook) = voice();
        toggle.start().unwrap();
        hook.fail_stop.store(true, Ordering::SeqCst);
        assert!(toggle.stop().is_err());
        assert_eq!(toggle.state(), ToggleState::Idle);
    }

    #[test]
    fn test_hook_error_resets_before_returning() {
        let (toggle, _hook) = voice();
        toggle.start().unwrap();
        let observer = toggle.state_machine();
        let err = toggle.on_hook_error(HookError::new("no permission"));
        assert_eq!(observer.current(), ToggleState::Idle);
        assert_eq!(err.to_string(), "no permission");
    }

    #[test]
    fn test_hook_error_while_idle_stays_idle() {
        let (toggle, _hook) = speech();
        toggle.on_hook_error(HookError::new("late error"));
        assert_eq!(toggle.state(), ToggleState::Idle);
    }

    #[test]
    fn test_hook_finished_skips_stop_hook() {
        let (toggle, hook) = speech();
        toggle.start("西湖很美").unwrap();
        assert!(toggle.on_hook_finished());
        assert!(!toggle.on_hook_finished());
        assert_eq!(hook.stops.load(Ordering::SeqCst), 0);
        assert_eq!(toggle.state(), ToggleState::Idle);
    }

    #[test]
    fn test_speech_start_passes_text() {
        let (toggle, hook) = speech();
        toggle.start("西湖很美").unwrap();
        assert_eq!(*hook.last_arg.lock().unwrap(), "西湖很美");
        assert!(matches!(
            toggle.start("again"),
            Err(ChatError::AlreadyActive(name)) if name == "speech playback"
        ));
    }

    #[test]
    fn test_toggle_alternates() {
        let (toggle, hook) = speech();
        assert_eq!(toggle.toggle("a").unwrap(), ToggleState::Active);
        assert_eq!(toggle.toggle("b").unwrap(), ToggleState::Idle);
        assert_eq!(hook.starts.load(Ordering::SeqCst), 1);
        assert_eq!(hook.stops.load(Ordering::SeqCst), 1);

        let (voice, _) = voice();
        assert_eq!(voice.toggle().unwrap(), ToggleState::Active);
        assert_eq!(voice.toggle().unwrap(), ToggleState::Idle);
    }
}
