//! Terminal stand-ins for the platform voice engines.
//!
//! The console has no microphone or speaker access, so capture is simulated
//! by the next line the user types and playback by printing the text and
//! waiting a moment proportional to its length. Both hooks report their
//! activity as [`HookEvent`]s; the REPL turns those into controller callbacks.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::UnboundedSender;
use tour_chat::{CaptureHook, HookError, Notice, NoticeSink, PlaybackHook, TracingNoticeSink};

/// Activity reported by the console hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    ListeningStarted,
    ListeningStopped,
    /// Playback of `chars` characters started under `generation`.
    SpeechStarted { generation: u64, chars: usize },
    SpeechStopped { generation: u64 },
    /// The simulated playback for `generation` ran to its end.
    SpeechElapsed { generation: u64 },
}

/// Capture hook that waits for the next typed line as the transcript.
#[derive(Debug, Clone)]
pub struct ConsoleCaptureHook {
    events: UnboundedSender<HookEvent>,
}

impl ConsoleCaptureHook {
    pub fn new(events: UnboundedSender<HookEvent>) -> Self {
        Self { events }
    }
}

impl CaptureHook for ConsoleCaptureHook {
    fn start(&self, locale: &str) -> Result<(), HookError> {
        println!("[语音输入 {locale}] 正在聆听... 输入一行文字作为识别结果，或输入 /voice 取消");
        self.events
            .send(HookEvent::ListeningStarted)
            .map_err(|_| HookError::new("console closed"))
    }

    fn stop(&self) -> Result<(), HookError> {
        println!("[语音输入] 已停止");
        self.events
            .send(HookEvent::ListeningStopped)
            .map_err(|_| HookError::new("console closed"))
    }
}

/// Playback hook that prints the text and reports a playback generation.
///
/// Every start and stop advances the generation so a late
/// [`HookEvent::SpeechElapsed`] from an earlier playback can be told apart.
#[derive(Debug)]
pub struct ConsolePlaybackHook {
    events: UnboundedSender<HookEvent>,
    generation: AtomicU64,
}

impl ConsolePlaybackHook {
    pub fn new(events: UnboundedSender<HookEvent>) -> Self {
        Self {
            events,
            generation: AtomicU64::new(0),
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl PlaybackHook for ConsolePlaybackHook {
    fn start(&self, text: &str) -> Result<(), HookError> {
        let generation = self.next_generation();
        println!("[语音播报] {text}");
        self.events
            .send(HookEvent::SpeechStarted {
                generation,
                chars: text.chars().count(),
            })
            .map_err(|_| HookError::new("console closed"))
    }

    fn stop(&self) -> Result<(), HookError> {
        let generation = self.next_generation();
        println!("[语音播报] 已停止");
        self.events
            .send(HookEvent::SpeechStopped { generation })
            .map_err(|_| HookError::new("console closed"))
    }
}

/// Prints notices for the user and keeps the tracing record.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNoticeSink;

impl NoticeSink for ConsoleNoticeSink {
    fn notify(&self, notice: Notice) {
        println!("[提示] {notice}");
        TracingNoticeSink.notify(notice);
    }
}
