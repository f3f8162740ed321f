//! Google Gemini provider
//!
//! See: https://ai.google.dev/api/generate-content

use crate::error::{AiError, Result};
use crate::provider::AiProvider;
use crate::request::{FinishReason, ProviderRequest, ProviderResponse};
use crate::transcript::ChatRole;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Google Gemini provider with optional native search grounding
pub struct GeminiProvider {
    client: Client,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AiError::ConfigurationError(
                "Gemini API key is empty".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key })
    }

    async fn generate(&self, request: &ProviderRequest, with_search: bool) -> Result<Value> {
        let contents: Vec<ContentWire> = request
            .turns
            .iter()
            .map(|turn| ContentWire {
                role: match turn.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                },
                parts: vec![PartWire {
                    text: turn.text.clone(),
                }],
            })
            .collect();

        let wire = GenerateRequestWire {
            contents,
            system_instruction: request.system.as_ref().map(|s| SystemWire {
                parts: vec![PartWire { text: s.clone() }],
            }),
            generation_config: GenerationConfigWire {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
            tools: with_search.then(|| vec![ToolWire { google_search: serde_json::json!({}) }]),
        };

        let url = format!("{GEMINI_API_BASE}/{}:generateContent", request.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&wire)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::from_status(status.as_u16(), &request.model, body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn send(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let raw = match self.generate(request, request.enable_search).await {
            Ok(raw) => raw,
            // Some models reject the search tool outright; retry bare so a
            // grounding option never breaks the analysis itself.
            Err(AiError::InvalidRequest(_) | AiError::ModelNotFound(_)) if request.enable_search => {
                warn!(model = %request.model, "search tool rejected, retrying without it");
                self.generate(request, false).await?
            }
            Err(err) => return Err(err),
        };

        let candidate = raw
            .get("candidates")
            .and_then(|c| c.get(0))
            .ok_or_else(|| AiError::UnexpectedResponse("no candidates in response".to_string()))?;

        let text = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let finish = match candidate.get("finishReason").and_then(Value::as_str) {
            Some("MAX_TOKENS") => FinishReason::Truncated,
            Some("STOP") | None => FinishReason::Complete,
            Some(other) => FinishReason::Other(other.to_string()),
        };
        debug!(finish = ?finish, chars = text.len(), "gemini response received");

        Ok(ProviderResponse {
            text,
            finish,
            raw: Some(raw),
        })
    }
}

// Wire types matching the generateContent API

#[derive(Debug, Serialize)]
struct GenerateRequestWire {
    contents: Vec<ContentWire>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemWire>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfigWire,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolWire>>,
}

#[derive(Debug, Serialize)]
struct ContentWire {
    role: &'static str,
    parts: Vec<PartWire>,
}

#[derive(Debug, Serialize)]
struct SystemWire {
    parts: Vec<PartWire>,
}

#[derive(Debug, Serialize)]
struct PartWire {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfigWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ToolWire {
    google_search: Value,
}
