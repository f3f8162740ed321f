//! Anthropic Claude provider
//!
//! See: https://docs.anthropic.com/en/api/messages

use crate::error::{AiError, Result};
use crate::provider::AiProvider;
use crate::request::{FinishReason, ProviderRequest, ProviderResponse};
use crate::transcript::ChatRole;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// max_tokens is mandatory on this API; used when the request leaves it unset.
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Anthropic Claude provider
pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    default_max_tokens: u32,
}

impl ClaudeProvider {
    pub fn new(api_key: String, default_max_tokens: u32, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AiError::ConfigurationError(
                "Claude API key is empty".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            default_max_tokens: if default_max_tokens == 0 {
                DEFAULT_MAX_TOKENS
            } else {
                default_max_tokens
            },
        })
    }
}

#[async_trait]
impl AiProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn send(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let messages: Vec<MessageWire> = request
            .turns
            .iter()
            .map(|turn| MessageWire {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: turn.text.clone(),
            })
            .collect();

        let wire = MessagesRequestWire {
            model: request.model.clone(),
            messages,
            system: request.system.clone(),
            max_tokens: request.max_tokens.unwrap_or(self.default_max_tokens),
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(format!("{ANTHROPIC_API_BASE}/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&wire)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::from_status(status.as_u16(), &request.model, body));
        }

        let raw: Value = response.json().await?;
        let text = raw
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let finish = match raw.get("stop_reason").and_then(Value::as_str) {
            Some("max_tokens") => FinishReason::Truncated,
            Some("end_turn" | "stop_sequence") | None => FinishReason::Complete,
            Some(other) => FinishReason::Other(other.to_string()),
        };
        debug!(finish = ?finish, chars = text.len(), "claude response received");

        Ok(ProviderResponse {
            text,
            finish,
            raw: Some(raw),
        })
    }
}

// Wire types matching the Messages API

#[derive(Debug, Serialize)]
struct MessagesRequestWire {
    model: String,
    messages: Vec<MessageWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct MessageWire {
    role: &'static str,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = ClaudeProvider::new("test-key".to_string(), 4096, Duration::from_secs(5));
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().name(), "claude");
    }

    #[test]
    fn test_zero_max_tokens_falls_back_to_default() {
        let provider =
            ClaudeProvider::new("test-key".to_string(), 0, Duration::from_secs(5)).unwrap();
        assert_eq!(provider.default_max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_empty_key_is_a_config_error() {
        let result = ClaudeProvider::new(String::new(), 4096, Duration::from_secs(5));
        assert!(matches!(result, Err(AiError::ConfigurationError(_))));
    }
}
