use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{default_spots, Spot};

/// Environment variable that overrides `completion.api_key`.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Top-level configuration for the tour guide.
///
/// Loaded from `~/.tour-guide/config.toml` by default. Every section falls
/// back to its defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default = "default_spots")]
    pub spots: Vec<Spot>,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            completion: CompletionConfig::default(),
            chat: ChatConfig::default(),
            spots: default_spots(),
        }
    }
}

impl TourConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TourConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply environment overrides. Currently only the API credential.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.completion.apply_key_override(Some(key));
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Completion service settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Bearer credential. A blank value counts as absent.
    pub api_key: Option<String>,
    /// API base URL, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Bounded wait for one completion, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            request_timeout_secs: 30,
        }
    }
}

impl CompletionConfig {
    /// The configured credential, if any non-blank one is set.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Replace the credential with `key` when it is non-blank.
    pub fn apply_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
    }
}

/// Chat session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Locale handed to the voice capture hook.
    pub locale: String,
    /// Start playback of every successful reply.
    pub auto_speak: bool,
    /// Reply appended when the completion service fails.
    pub fallback_reply: String,
    /// Greeting shown when a session opens. `{name}` is replaced by the spot name.
    pub greeting_template: String,
    /// Longest accepted user message, in characters.
    pub max_message_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            locale: "zh-CN".to_string(),
            auto_speak: true,
            fallback_reply: "抱歉，我现在无法回答您的问题。请稍后再试。".to_string(),
            greeting_template: "欢迎来到{name}！我是您的 AI 导游助手。请问有什么我可以帮您的吗？"
                .to_string(),
            max_message_chars: 2000,
        }
    }
}

impl ChatConfig {
    /// Render the greeting for a spot.
    pub fn greeting_for(&self, spot_name: &str) -> String {
        self.greeting_template.replace("{name}", spot_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TourError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = TourConfig::default();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.completion.max_tokens, 1000);
        assert_eq!(config.completion.request_timeout_secs, 30);
        assert!(config.completion.api_key.is_none());
        assert_eq!(config.chat.locale, "zh-CN");
        assert!(config.chat.auto_speak);
        assert_eq!(config.spots.len(), 5);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[completion]
api_key = "sk-test"
base_url = "http://localhost:8080/v1"
model = "gpt-4o-mini"
temperature = 0.2
max_tokens = 256
request_timeout_secs = 5

[chat]
locale = "en-US"
auto_speak = false

[[spots]]
id = "bund"
name = "外滩"
description = "上海的城市名片。"
"#;
        let file = create_temp_config(content);
        let config = TourConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.completion.credential(), Some("sk-test"));
        assert_eq!(config.completion.base_url, "http://localhost:8080/v1");
        assert_eq!(config.completion.max_tokens, 256);
        assert_eq!(config.chat.locale, "en-US");
        assert!(!config.chat.auto_speak);
        assert_eq!(config.spots.len(), 1);
        assert_eq!(config.spots[0].name, "外滩");
        assert!(config.spots[0].image.is_empty());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "error"
"#;
        let file = create_temp_config(content);
        let config = TourConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "error");
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.chat.max_message_chars, 2000);
        assert_eq!(config.spots.len(), 5);
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[general\nlog_level = ");
        let result = TourConfig::load(file.path());
        assert!(matches!(result, Err(TourError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = TourConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.spots.len(), 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = TourConfig::default();
        config.completion.api_key = Some("sk-saved".to_string());
        config.save(&path).unwrap();

        let reloaded = TourConfig::load(&path).unwrap();
        assert_eq!(reloaded.completion.credential(), Some("sk-saved"));
        assert_eq!(reloaded.chat.fallback_reply, config.chat.fallback_reply);
        assert_eq!(reloaded.spots, config.spots);
    }

    #[test]
    fn test_blank_credential_counts_as_absent() {
        let mut completion = CompletionConfig::default();
        completion.api_key = Some("   ".to_string());
        assert!(completion.credential().is_none());
    }

    #[test]
    fn test_key_override_ignores_blank() {
        let mut completion = CompletionConfig::default();
        completion.api_key = Some("sk-file".to_string());

        completion.apply_key_override(Some(String::new()));
        assert_eq!(completion.credential(), Some("sk-file"));

        completion.apply_key_override(None);
        assert_eq!(completion.credential(), Some("sk-file"));

        completion.apply_key_override(Some("sk-env".to_string()));
        assert_eq!(completion.credential(), Some("sk-env"));
    }

    #[test]
    fn test_greeting_for_spot() {
        let chat = ChatConfig::default();
        assert_eq!(
            chat.greeting_for("西湖"),
            "欢迎来到西湖！我是您的 AI 导游助手。请问有什么我可以帮您的吗？"
        );
    }
}
