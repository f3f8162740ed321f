//! Compare orchestrator: bounded fan-out, order-preserving fan-in

use crate::error::EngineError;
use crate::resolver::{FieldResolver, ResolveFailure};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use stocklens_core::snapshot::SecuritySnapshot;
use stocklens_core::{SourceWarning, Symbol, SymbolSet};
use tracing::{debug, instrument, warn};

/// One symbol that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolFailure {
    pub symbol: String,
    pub message: String,
}

/// The result of one comparison request.
///
/// `snapshots` holds the successfully resolved symbols in request order;
/// `errors` holds the failed ones. Both can be non-empty at once.
/// Resolved snapshots carry their own warnings; `warnings` holds the
/// per-source diagnostics of symbols that produced no snapshot.
#[derive(Debug)]
pub struct CompareOutcome {
    pub snapshots: Vec<SecuritySnapshot>,
    pub warnings: Vec<SourceWarning>,
    pub errors: Vec<SymbolFailure>,
}

/// Fans a comparison request out across symbols and reassembles results in
/// request order.
pub struct CompareOrchestrator {
    resolver: Arc<FieldResolver>,
    worker_cap: usize,
    symbol_timeout: Duration,
}

impl CompareOrchestrator {
    pub fn new(resolver: Arc<FieldResolver>, worker_cap: usize, symbol_timeout: Duration) -> Self {
        Self {
            resolver,
            worker_cap: worker_cap.max(1),
            symbol_timeout,
        }
    }

    /// Resolve every symbol in the set concurrently.
    ///
    /// Concurrency is capped at the configured worker count regardless of
    /// request size. A failure (including timeout) for one symbol becomes
    /// an error entry without affecting its siblings.
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    pub async fn compare(&self, symbols: &SymbolSet, force_financial_refresh: bool) -> CompareOutcome {
        let mut results: Vec<(usize, std::result::Result<SecuritySnapshot, ResolveFailure>)> =
            stream::iter(symbols.iter().cloned().enumerate())
                .map(|(index, symbol)| {
                    let resolver = self.resolver.clone();
                    let timeout = self.symbol_timeout;
                    async move {
                        let result = Self::resolve_one(
                            &resolver,
                            &symbol,
                            force_financial_refresh,
                            timeout,
                        )
                        .await;
                        (index, result)
                    }
                })
                .buffer_unordered(self.worker_cap)
                .collect()
                .await;

        // fan-in: back to request order
        results.sort_by_key(|(index, _)| *index);

        let mut outcome = CompareOutcome {
            snapshots: Vec::with_capacity(results.len()),
            warnings: Vec::new(),
            errors: Vec::new(),
        };
        for ((_, result), symbol) in results.into_iter().zip(symbols.iter()) {
            match result {
                Ok(snapshot) => outcome.snapshots.push(snapshot),
                Err(failure) => {
                    warn!(symbol = %symbol, error = %failure.error, "symbol resolution failed");
                    outcome.warnings.extend(failure.warnings);
                    outcome.errors.push(SymbolFailure {
                        symbol: symbol.to_string(),
                        message: failure.error.to_string(),
                    });
                }
            }
        }

        debug!(
            resolved = outcome.snapshots.len(),
            failed = outcome.errors.len(),
            "comparison complete"
        );
        outcome
    }

    async fn resolve_one(
        resolver: &FieldResolver,
        symbol: &Symbol,
        force: bool,
        timeout: Duration,
    ) -> std::result::Result<SecuritySnapshot, ResolveFailure> {
        match tokio::time::timeout(timeout, resolver.resolve(symbol, force)).await {
            Ok(result) => result,
            Err(_) => Err(ResolveFailure::bare(EngineError::Timeout(
                symbol.to_string(),
            ))),
        }
    }
}
