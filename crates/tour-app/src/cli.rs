//! CLI argument definitions for the tour guide.
//!
//! Uses `clap` with derive macros.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tour guide: chat with an AI guide about a tour spot.
#[derive(Parser, Debug)]
#[command(name = "tour-guide", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List the spots in the catalog.
    Spots {
        /// Print the catalog as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Open a chat session with the guide for one spot.
    Chat {
        /// Catalog id of the spot.
        #[arg(short = 's', long = "spot", default_value = "1")]
        spot: String,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TOUR_GUIDE_CONFIG env var > platform default (~/.tour-guide/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TOUR_GUIDE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > RUST_LOG > config file value.
    pub fn resolve_log_filter(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(filter) = std::env::var("RUST_LOG") {
            if !filter.trim().is_empty() {
                return filter;
            }
        }
        config_level.to_string()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tour-guide").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tour-guide").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_with_spot() {
        let args = CliArgs::try_parse_from(["tour-guide", "chat", "--spot", "3"]).unwrap();
        assert_eq!(
            args.command,
            Command::Chat {
                spot: "3".to_string()
            }
        );
    }

    #[test]
    fn test_chat_spot_defaults_to_first() {
        let args = CliArgs::try_parse_from(["tour-guide", "chat"]).unwrap();
        assert_eq!(
            args.command,
            Command::Chat {
                spot: "1".to_string()
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args =
            CliArgs::try_parse_from(["tour-guide", "spots", "--json", "-c", "/tmp/t.toml"])
                .unwrap();
        assert_eq!(args.command, Command::Spots { json: true });
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/t.toml"));
    }

    #[test]
    fn test_log_flag_wins() {
        let args =
            CliArgs::try_parse_from(["tour-guide", "--log-level", "debug", "spots"]).unwrap();
        assert_eq!(args.resolve_log_filter("warn"), "debug");
    }

    #[test]
    fn test_subcommand_required() {
        assert!(CliArgs::try_parse_from(["tour-guide"]).is_err());
    }
}
