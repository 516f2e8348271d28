//! Line-oriented chat screen bound to a [`SessionController`].
//!
//! A renderer task follows the controller's snapshot channel and prints new
//! turns as they land. The input loop reads stdin and console hook events,
//! forwarding them to the controller.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tour_chat::{ChatError, Role, SessionController, SessionSnapshot, ToggleState, Turn};

use crate::console::HookEvent;

const HELP: &str = "命令: /voice 语音输入  /speak 播报最新回复  /help 帮助  /quit 退出";

/// Simulated playback speed.
const MILLIS_PER_CHAR: u64 = 60;
const MAX_PLAYBACK: Duration = Duration::from_secs(10);

/// One line of user input, classified.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Empty,
    Quit,
    Help,
    Voice,
    Speak,
    Message(String),
}

pub fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/help" => Input::Help,
        "/voice" => Input::Voice,
        "/speak" => Input::Speak,
        text => Input::Message(text.to_string()),
    }
}

/// Render a turn with its local wall-clock time.
pub fn format_turn(turn: &Turn) -> String {
    let time = turn
        .created_at
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S");
    let speaker = match turn.role {
        Role::User => "我",
        Role::Assistant => "导游",
    };
    format!("[{time}] {speaker}: {}", turn.text)
}

/// Lines to print for `snapshot` given what has been shown so far.
///
/// Updates `shown` and `composing` to reflect the new screen state.
pub fn render_update(
    snapshot: &SessionSnapshot,
    shown: &mut usize,
    composing: &mut bool,
) -> Vec<String> {
    let mut lines: Vec<String> = snapshot
        .turns
        .iter()
        .skip(*shown)
        .map(format_turn)
        .collect();
    *shown = snapshot.turns.len();

    let now_composing = snapshot.is_composing();
    if now_composing && !*composing {
        lines.push("导游正在输入...".to_string());
    }
    *composing = now_composing;
    lines
}

fn playback_duration(chars: usize) -> Duration {
    Duration::from_millis(chars as u64 * MILLIS_PER_CHAR).min(MAX_PLAYBACK)
}

fn latest_reply(controller: &SessionController) -> Option<String> {
    controller
        .turns()
        .into_iter()
        .rev()
        .find(|t| t.role == Role::Assistant)
        .map(|t| t.text)
}

async fn render_loop(mut rx: watch::Receiver<SessionSnapshot>) {
    let mut shown = 0;
    let mut composing = false;
    loop {
        let lines = {
            let snapshot = rx.borrow_and_update();
            render_update(&snapshot, &mut shown, &mut composing)
        };
        for line in lines {
            println!("{line}");
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

fn spawn_submit(controller: &Arc<SessionController>, text: String) {
    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        match controller.submit(&text).await {
            Ok(outcome) => tracing::debug!(outcome = ?outcome, "Submit finished"),
            Err(ChatError::Busy) => println!("[提示] 请等待导游回复完成后再发送"),
            Err(ChatError::SessionClosed) => {}
            Err(e) => println!("[提示] {e}"),
        }
    });
}

/// Run the chat screen until the user quits or stdin closes.
pub async fn run_chat(
    controller: Arc<SessionController>,
    events_tx: UnboundedSender<HookEvent>,
    mut events: UnboundedReceiver<HookEvent>,
) -> std::io::Result<()> {
    println!("== {} ==", controller.spot().name);
    println!("{HELP}");

    let renderer = tokio::spawn(render_loop(controller.subscribe()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut playback_generation = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_input(&line) {
                    Input::Empty => {}
                    Input::Quit => break,
                    Input::Help => println!("{HELP}"),
                    Input::Voice => {
                        if let Err(e) = controller.toggle_voice() {
                            tracing::debug!(error = %e, "Voice toggle rejected");
                        }
                    }
                    Input::Speak => match latest_reply(&controller) {
                        Some(text) => {
                            if let Err(e) = controller.toggle_speech(&text) {
                                tracing::debug!(error = %e, "Speech toggle rejected");
                            }
                        }
                        None => println!("[提示] 暂无可播报的回复"),
                    },
                    Input::Message(text) => {
                        if controller.voice_state() == ToggleState::Active {
                            controller.on_voice_finished();
                        }
                        spawn_submit(&controller, text);
                    }
                }
            }
            Some(event) = events.recv() => match event {
                HookEvent::SpeechStarted { generation, chars } => {
                    playback_generation = generation;
                    let tx = events_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(playback_duration(chars)).await;
                        let _ = tx.send(HookEvent::SpeechElapsed { generation });
                    });
                }
                HookEvent::SpeechStopped { generation } => playback_generation = generation,
                HookEvent::SpeechElapsed { generation } if generation == playback_generation => {
                    controller.on_speech_finished();
                }
                other => tracing::trace!(event = ?other, "Hook event"),
            },
        }
    }

    controller.close();
    renderer.abort();
    println!("再见！");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn turn(role: Role, text: &str) -> Turn {
        Turn {
            id: Uuid::new_v4(),
            text: text.to_string(),
            role,
            created_at: Utc::now(),
        }
    }

    fn snapshot(turns: Vec<Turn>, pending: bool) -> SessionSnapshot {
        SessionSnapshot {
            turns,
            pending,
            voice_state: ToggleState::Idle,
            speech_state: ToggleState::Idle,
        }
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input(" /voice "), Input::Voice);
        assert_eq!(parse_input("/speak"), Input::Speak);
        assert_eq!(
            parse_input("  西湖有多大？ "),
            Input::Message("西湖有多大？".to_string())
        );
    }

    #[test]
    fn test_format_turn_shows_speaker_and_time() {
        let line = format_turn(&turn(Role::Assistant, "欢迎"));
        assert!(line.ends_with("] 导游: 欢迎"));
        // "[HH:MM:SS]"
        assert_eq!(line.find(']'), Some(9));
        assert!(format_turn(&turn(Role::User, "你好")).ends_with("我: 你好"));
    }

    #[test]
    fn test_render_update_prints_only_new_turns() {
        let mut shown = 0;
        let mut composing = false;
        let greeting = turn(Role::Assistant, "欢迎");
        let question = turn(Role::User, "西湖很美");

        let first = render_update(&snapshot(vec![greeting.clone()], false), &mut shown, &mut composing);
        assert_eq!(first.len(), 1);

        let second = render_update(
            &snapshot(vec![greeting, question], true),
            &mut shown,
            &mut composing,
        );
        assert_eq!(second.len(), 2);
        assert!(second[0].ends_with("我: 西湖很美"));
        assert_eq!(second[1], "导游正在输入...");
        assert_eq!(shown, 2);
        assert!(composing);
    }

    #[test]
    fn test_composing_indicator_printed_once() {
        let mut shown = 0;
        let mut composing = false;
        let snap = snapshot(vec![turn(Role::User, "你好")], true);

        assert_eq!(render_update(&snap, &mut shown, &mut composing).len(), 2);
        assert!(render_update(&snap, &mut shown, &mut composing).is_empty());
    }

    #[test]
    fn test_playback_duration_is_capped() {
        assert_eq!(playback_duration(10), Duration::from_millis(600));
        assert_eq!(playback_duration(100_000), MAX_PLAYBACK);
    }
}
