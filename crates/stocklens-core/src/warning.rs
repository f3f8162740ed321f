//! Non-fatal per-source warnings collected during aggregation

use serde::{Deserialize, Serialize};

/// A recoverable failure from one source attempt.
///
/// Warnings never abort a symbol's resolution; they are accumulated and
/// returned alongside the snapshot so the caller can render partial data
/// with an explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceWarning {
    /// Source identifier, e.g. `finnhub/quote` or `yahoo.page`
    pub source: String,
    /// Human-readable failure description
    pub message: String,
    /// HTTP status when the failure was an HTTP error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl SourceWarning {
    /// Create a warning without an HTTP status.
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a warning carrying an HTTP status.
    pub fn with_status(source: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            status_code: Some(status),
        }
    }
}

/// Drop exact duplicate warnings, keeping first occurrence order.
pub fn dedupe_warnings(warnings: Vec<SourceWarning>) -> Vec<SourceWarning> {
    let mut out: Vec<SourceWarning> = Vec::with_capacity(warnings.len());
    for warning in warnings {
        if !out.contains(&warning) {
            out.push(warning);
        }
    }
    out
}
