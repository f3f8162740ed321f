//! Shared data model for stocklens
//!
//! This crate defines the types the rest of the workspace agrees on:
//!
//! - Validated ticker symbols and bounded, order-preserving symbol sets
//! - Metric fields with explicit provenance (which source supplied a value)
//! - The per-security snapshot assembled by the aggregation engine
//! - Non-fatal source warnings collected during aggregation
//! - Runtime configuration with env-var overrides
//! - A clock abstraction so cache expiry is testable without real sleeps

pub mod clock;
pub mod config;
pub mod currency;
pub mod error;
pub mod field;
pub mod num;
pub mod snapshot;
pub mod symbol;
pub mod warning;

// Re-export main types for convenience
pub use clock::{Clock, SystemClock};
pub use config::LensConfig;
pub use error::{LensError, Result};
pub use field::{MetricField, Provenance};
pub use snapshot::{
    CurrencyBlock, EarningsHistoryRow, EpsTrendRow, ExpectationGuidance, ForecastOutlook,
    LatestFinancials, NewsItem, PeriodType, RealtimeQuote, SecuritySnapshot, StatementRow,
    SurpriseVerdict, TrendSignal, ValuationRatios,
};
pub use symbol::{Symbol, SymbolSet, MAX_COMPARE_SYMBOLS};
pub use warning::SourceWarning;
