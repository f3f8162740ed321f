//! OpenAI-compatible chat-completions provider
//!
//! Works against api.openai.com and any endpoint speaking the same
//! protocol (DeepSeek, local gateways) via a configurable base URL.

use crate::error::{AiError, Result};
use crate::provider::AiProvider;
use crate::request::{FinishReason, ProviderRequest, ProviderResponse};
use crate::transcript::ChatRole;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider
pub struct OpenAiCompatProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatProvider {
    /// Create a provider against the standard OpenAI endpoint.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, timeout)
    }

    /// Create a provider against a compatible endpoint.
    pub fn with_base_url(
        api_key: String,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AiError::ConfigurationError(
                "OpenAI-compatible API key is empty".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Validate credentials by listing models.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AiError::from_status(status.as_u16(), "", body))
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatProvider {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn send(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let mut messages: Vec<MessageWire> = Vec::with_capacity(request.turns.len() + 1);
        if let Some(system) = &request.system {
            messages.push(MessageWire {
                role: "system",
                content: system.clone(),
            });
        }
        for turn in &request.turns {
            messages.push(MessageWire {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: turn.text.clone(),
            });
        }

        let wire = ChatRequestWire {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&wire)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::from_status(status.as_u16(), &request.model, body));
        }

        let raw: serde_json::Value = response.json().await?;
        let parsed: ChatResponseWire = serde_json::from_value(raw.clone())
            .map_err(|e| AiError::UnexpectedResponse(format!("chat completion: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::UnexpectedResponse("no choices in response".to_string()))?;

        let finish = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Truncated,
            Some("stop") | None => FinishReason::Complete,
            Some(other) => FinishReason::Other(other.to_string()),
        };
        debug!(finish = ?finish, "chat completion received");

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            finish,
            raw: Some(raw),
        })
    }
}

// Wire types matching the chat-completions protocol

#[derive(Debug, Serialize)]
struct ChatRequestWire {
    model: String,
    messages: Vec<MessageWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct MessageWire {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponseWire {
    choices: Vec<ChoiceWire>,
}

#[derive(Debug, Deserialize)]
struct ChoiceWire {
    message: ChoiceMessageWire,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessageWire {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_a_config_error() {
        let result = OpenAiCompatProvider::new(String::new(), Duration::from_secs(5));
        assert!(matches!(result, Err(AiError::ConfigurationError(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let provider = OpenAiCompatProvider::with_base_url(
            "key".to_string(),
            "https://gateway.local/v1/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.base_url, "https://gateway.local/v1");
        assert_eq!(provider.name(), "openai_compat");
    }

    #[test]
    fn test_response_wire_parses_length_finish() {
        let raw = r#"{
            "choices": [
                {"message": {"content": "partial answer"}, "finish_reason": "length"}
            ]
        }"#;
        let parsed: ChatResponseWire = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("length"));
    }
}
