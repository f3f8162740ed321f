//! Aggregation engine for stocklens
//!
//! Wires the source clients into a per-symbol resolution pipeline:
//!
//! - [`cache::FinancialCache`] - TTL cache for statements and forecasts,
//!   expiry driven by an injected clock
//! - [`resolver::FieldResolver`] - per-field fallback chains with
//!   provenance and warning collection
//! - [`compare::CompareOrchestrator`] - bounded fan-out over the request's
//!   symbols, results in request order
//! - [`expectation`] - pure expectation-vs-results calculator

pub mod cache;
pub mod compare;
pub mod error;
pub mod expectation;
pub mod resolver;

// Re-export main types for convenience
pub use cache::{CacheLookup, CacheStatus, DataKind, FinancialCache, TtlStore};
pub use compare::{CompareOrchestrator, CompareOutcome, SymbolFailure};
pub use error::{EngineError, Result};
pub use resolver::{FieldResolver, ResolveFailure, ResolverFeeds};
