//! Error types for AI provider operations

use thiserror::Error;

/// Result type for AI operations
pub type Result<T> = std::result::Result<T, AiError>;

/// Errors from AI provider calls and analysis orchestration
#[derive(Error, Debug)]
pub enum AiError {
    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The provider rejected the request as malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Transient request failure (timeout, 5xx, transport)
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Response arrived but not in the expected shape
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Missing or inconsistent local configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The provider completed but produced no text
    #[error("Provider returned an empty response")]
    EmptyResponse,

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl AiError {
    /// True for failures the caller must fix in configuration rather than
    /// retry: bad credentials, unknown model, malformed request.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::ModelNotFound(_)
                | Self::InvalidRequest(_)
                | Self::ConfigurationError(_)
        )
    }

    /// Map a non-success HTTP status to the right variant.
    pub fn from_status(status: u16, model: &str, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed,
            404 => Self::ModelNotFound(model.to_string()),
            400 => Self::InvalidRequest(body),
            429 => Self::RateLimited(body),
            _ => Self::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_classification() {
        assert!(AiError::AuthenticationFailed.is_config_error());
        assert!(AiError::ModelNotFound("gpt-x".to_string()).is_config_error());
        assert!(AiError::InvalidRequest("bad".to_string()).is_config_error());
        assert!(!AiError::RateLimited("slow down".to_string()).is_config_error());
        assert!(!AiError::RequestFailed("503".to_string()).is_config_error());
        assert!(!AiError::EmptyResponse.is_config_error());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            AiError::from_status(401, "m", String::new()),
            AiError::AuthenticationFailed
        ));
        assert!(matches!(
            AiError::from_status(404, "m", String::new()),
            AiError::ModelNotFound(_)
        ));
        assert!(matches!(
            AiError::from_status(400, "m", String::new()),
            AiError::InvalidRequest(_)
        ));
        assert!(matches!(
            AiError::from_status(429, "m", String::new()),
            AiError::RateLimited(_)
        ));
        assert!(matches!(
            AiError::from_status(503, "m", String::new()),
            AiError::RequestFailed(_)
        ));
    }
}
