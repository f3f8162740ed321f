//! Provider-neutral request and response types

use crate::transcript::ChatTurn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a provider stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the answer
    Complete,
    /// Output limit reached; the text is a prefix of the full answer
    Truncated,
    /// Vendor-specific reason we do not special-case
    Other(String),
}

impl FinishReason {
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated)
    }
}

/// One provider call, expressed vendor-neutrally.
///
/// Adapters translate this into their wire format; nothing vendor-specific
/// leaks above this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    /// System prompt, when the vendor supports one
    pub system: Option<String>,
    /// Conversation turns, oldest first, ending with the active user turn
    pub turns: Vec<ChatTurn>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ask the provider to ground answers with its native web search,
    /// when it has one (currently Gemini only)
    pub enable_search: bool,
}

impl ProviderRequest {
    /// A single-turn request with the given user prompt.
    pub fn single_turn(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            turns: vec![ChatTurn::user(prompt)],
            temperature: None,
            max_tokens: None,
            enable_search: false,
        }
    }
}

/// A provider's answer to one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Concatenated text content
    pub text: String,
    pub finish: FinishReason,
    /// Raw response body for diagnostics
    pub raw: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::ChatRole;

    #[test]
    fn test_single_turn_request() {
        let request = ProviderRequest::single_turn("gpt-4o-mini", "Compare NVDA and AMD");
        assert_eq!(request.turns.len(), 1);
        assert_eq!(request.turns[0].role, ChatRole::User);
        assert!(!request.enable_search);
    }

    #[test]
    fn test_finish_reason_truncation() {
        assert!(FinishReason::Truncated.is_truncated());
        assert!(!FinishReason::Complete.is_truncated());
        assert!(!FinishReason::Other("content_filter".to_string()).is_truncated());
    }
}
