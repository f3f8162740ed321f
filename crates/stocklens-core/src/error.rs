//! Core error taxonomy shared across the workspace

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, LensError>;

/// Errors raised by the shared data model and configuration layer
#[derive(Debug, Error)]
pub enum LensError {
    /// A ticker token failed validation
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// A request carried zero valid symbols after validation
    #[error("No valid symbols in request")]
    NoValidSymbols,

    /// Configuration value out of range or unparseable
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LensError::InvalidSymbol("BAD$".to_string());
        assert_eq!(err.to_string(), "Invalid symbol: BAD$");
        assert_eq!(LensError::NoValidSymbols.to_string(), "No valid symbols in request");
    }
}
