//! Tour guide binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing (stderr, so logs stay out of the chat)
//! 3. `spots`: print the catalog
//! 4. `chat`: wire the completion client, console hooks and session
//!    controller together and run the chat screen

mod cli;
mod console;
mod repl;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tour_chat::{OpenAiCompletionClient, SessionController, SessionSettings};
use tour_core::{find_spot, Spot, SpotContext, TourConfig, TourError};

use cli::{CliArgs, Command};
use console::{ConsoleCaptureHook, ConsoleNoticeSink, ConsolePlaybackHook};

fn init_tracing(filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_spots(spots: &[Spot], json: bool) -> Result<(), TourError> {
    if json {
        println!("{}", serde_json::to_string_pretty(spots)?);
        return Ok(());
    }
    for spot in spots {
        println!("{:>3}  {}  {}", spot.id, spot.name, spot.description);
    }
    Ok(())
}

async fn run_chat(config: &TourConfig, spot_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let spot = find_spot(&config.spots, spot_id)
        .ok_or_else(|| TourError::UnknownSpot(spot_id.to_string()))?;
    let context = SpotContext::from(spot);
    let settings = SessionSettings::from_config(config, &context);

    let client = OpenAiCompletionClient::new(config.completion.clone());
    if !client.is_configured() {
        tracing::info!("No completion credential configured, replies will use the fallback");
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(
        context,
        settings,
        Arc::new(client),
        Arc::new(ConsoleCaptureHook::new(events_tx.clone())),
        Arc::new(ConsolePlaybackHook::new(events_tx.clone())),
    )
    .with_notice_sink(Arc::new(ConsoleNoticeSink));

    repl::run_chat(Arc::new(controller), events_tx, events_rx).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match TourConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (TourConfig::default(), Some(e)),
    };
    config.apply_env();

    // Tracing.
    init_tracing(&args.resolve_log_filter(&config.general.log_level));
    tracing::info!("Starting tour guide v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(_) if !config_file.exists() => {
            tracing::info!(path = %config_file.display(), "No configuration file, using defaults")
        }
        Some(e) => {
            tracing::warn!(path = %config_file.display(), error = %e, "Failed to load configuration, using defaults")
        }
    }

    match args.command {
        Command::Spots { json } => print_spots(&config.spots, json)?,
        Command::Chat { spot } => run_chat(&config, &spot).await?,
    }
    Ok(())
}
