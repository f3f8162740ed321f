//! Error types for the aggregation engine

use thiserror::Error;

/// Engine-level failures.
///
/// Per-symbol failures are collected in the compare outcome; only a request
/// with zero valid symbols aborts as a whole.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request contained no valid symbols
    #[error("No valid symbols in request")]
    NoValidSymbols,

    /// No source returned any data for the symbol
    #[error("No data available for {0}")]
    SymbolInvalid(String),

    /// The symbol's resolution exceeded the configured timeout
    #[error("Resolution for {0} timed out")]
    Timeout(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
