//! Completion service client.
//!
//! One request per turn against an OpenAI-compatible chat completions
//! endpoint. Only the guide persona and the newest user message are sent;
//! earlier turns are not replayed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tour_core::config::CompletionConfig;
use tour_core::SpotContext;

use crate::error::CompletionError;
use crate::types::Turn;

/// Converts a prompt into assistant text.
///
/// Implementations never panic across this boundary; every failure is a
/// [`CompletionError`].
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        persona: &str,
        history: &[Turn],
        user_text: &str,
    ) -> Result<String, CompletionError>;
}

/// System persona for a guide presenting `spot`.
pub fn build_persona(spot: &SpotContext) -> String {
    format!(
        "你是一个专业的景点导游，正在为游客介绍{}。你需要根据景点的特点和游客的问题提供专业、友好的解答。以下是景点的基本信息：{}",
        spot.name, spot.description
    )
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [RequestMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Pull the assistant text out of a chat completions response body.
pub fn extract_reply(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::MalformedResponse("no choices".to_string()))?
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| CompletionError::MalformedResponse("choice has no content".to_string()))?;

    if content.trim().is_empty() {
        return Err(CompletionError::MalformedResponse(
            "choice content is empty".to_string(),
        ));
    }
    Ok(content)
}

/// Extract an error message from a provider error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

// =============================================================================
// OpenAiCompletionClient
// =============================================================================

/// HTTP client for OpenAI-compatible chat completions.
pub struct OpenAiCompletionClient {
    config: CompletionConfig,
    client: reqwest::Client,
}

// Hand-written so the API key never reaches a log line.
impl std::fmt::Debug for OpenAiCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompletionClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("has_credential", &self.config.credential().is_some())
            .finish()
    }
}

impl OpenAiCompletionClient {
    pub fn new(config: CompletionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.credential().is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(
        &self,
        persona: &str,
        history: &[Turn],
        user_text: &str,
    ) -> Result<String, CompletionError> {
        let api_key = self.config.credential().ok_or_else(|| {
            CompletionError::Configuration("no API key configured".to_string())
        })?;

        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: [
                RequestMessage {
                    role: "system",
                    content: persona,
                },
                RequestMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        tracing::debug!(
            model = %self.config.model,
            history_turns = history.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(format!("reading response body: {e}")))?;

        if !status.is_success() {
            return Err(CompletionError::Network(format!(
                "HTTP {}: {}",
                status.as_u16(),
                extract_error_message(&text)
            )));
        }

        extract_reply(&text)
    }
}
