//! Error types for external data sources

use stocklens_core::SourceWarning;
use thiserror::Error;

/// Failure from one external data-source attempt.
///
/// These are recoverable by design: the resolver converts them to
/// [`SourceWarning`]s and falls through to the next provider in the chain.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP response with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response arrived but its structure was not what we expect
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Transport-level failure (DNS, connection reset, TLS)
    #[error("Network error: {0}")]
    Network(String),

    /// The client has no API key configured
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// Provider returned success but no usable data for the symbol
    #[error("No data for {symbol}: {reason}")]
    NoData { symbol: String, reason: String },
}

impl SourceError {
    /// HTTP status, when this failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Convert to a per-source warning for the snapshot.
    pub fn to_warning(&self, source: impl Into<String>) -> SourceWarning {
        match self.status() {
            Some(status) => SourceWarning::with_status(source, self.to_string(), status),
            None => SourceWarning::new(source, self.to_string()),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type alias for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_carries_status() {
        let err = SourceError::Http {
            status: 429,
            message: "too many requests".to_string(),
        };
        let warning = err.to_warning("finnhub/quote");
        assert_eq!(warning.status_code, Some(429));
        assert_eq!(warning.source, "finnhub/quote");
    }

    #[test]
    fn test_warning_without_status() {
        let warning = SourceError::Timeout.to_warning("yahoo.chart");
        assert_eq!(warning.status_code, None);
        assert_eq!(warning.message, "Request timed out");
    }
}
