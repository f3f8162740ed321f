//! TTL cache for fetched financial data
//!
//! Statements and forecasts change on reporting cadence, not tick cadence,
//! so both are cached per symbol with a long TTL. Expiry uses an injected
//! [`Clock`] so tests advance time without sleeping. A failed refresh never
//! evicts: the stale entry is returned alongside the error so callers can
//! render old data with a warning.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stocklens_core::{Clock, Symbol};
use stocklens_sources::SourceError;
use tokio::sync::RwLock;
use tracing::debug;

/// Which cached payload a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// Reported statements
    Financials,
    /// Analyst estimates and earnings history
    Forecast,
}

/// How a cache lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from a fresh stored entry, no fetch
    Hit,
    /// Fetched from the source and stored
    Fetched,
    /// Fetch failed; served the previous (expired) entry instead
    StaleAfterError,
}

/// A satisfied lookup: the payload, how it was obtained, and the fetch
/// error when stale data had to stand in.
#[derive(Debug)]
pub struct CacheLookup<T> {
    pub payload: T,
    pub status: CacheStatus,
    /// Present only when `status` is [`CacheStatus::StaleAfterError`]
    pub error: Option<SourceError>,
}

struct Entry<T> {
    payload: T,
    fetched_at: DateTime<Utc>,
}

/// One TTL-bounded payload store, keyed by symbol.
pub struct TtlStore<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<Symbol, Entry<T>>>,
}

impl<T: Clone + Send + Sync> TtlStore<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, entry: &Entry<T>, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(entry.fetched_at);
        age.to_std().is_ok_and(|age| age < self.ttl)
    }

    /// Return the stored payload when fresh, otherwise fetch.
    ///
    /// `force` skips the freshness check but not the store: a successful
    /// forced fetch still replaces the entry. A failed fetch leaves the
    /// previous entry intact; when one exists it is returned as stale, and
    /// only a cache without history propagates the error.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        symbol: &Symbol,
        force: bool,
        fetch: F,
    ) -> Result<CacheLookup<T>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let now = self.clock.now();

        if !force {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(symbol) {
                if self.is_fresh(entry, now) {
                    return Ok(CacheLookup {
                        payload: entry.payload.clone(),
                        status: CacheStatus::Hit,
                        error: None,
                    });
                }
            }
        }

        match fetch().await {
            Ok(payload) => {
                let mut entries = self.entries.write().await;
                entries.insert(
                    symbol.clone(),
                    Entry {
                        payload: payload.clone(),
                        fetched_at: now,
                    },
                );
                Ok(CacheLookup {
                    payload,
                    status: CacheStatus::Fetched,
                    error: None,
                })
            }
            Err(err) => {
                let entries = self.entries.read().await;
                match entries.get(symbol) {
                    Some(stale) => {
                        debug!(symbol = %symbol, error = %err, "fetch failed, serving stale entry");
                        Ok(CacheLookup {
                            payload: stale.payload.clone(),
                            status: CacheStatus::StaleAfterError,
                            error: Some(err),
                        })
                    }
                    None => Err(err),
                }
            }
        }
    }

    pub async fn invalidate(&self, symbol: &Symbol) {
        self.entries.write().await.remove(symbol);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

/// The engine's financial-data cache: statements and forecasts stored
/// independently under the same TTL and clock.
pub struct FinancialCache<F, E> {
    financials: TtlStore<F>,
    forecasts: TtlStore<E>,
}

impl<F, E> FinancialCache<F, E>
where
    F: Clone + Send + Sync,
    E: Clone + Send + Sync,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            financials: TtlStore::new(ttl, clock.clone()),
            forecasts: TtlStore::new(ttl, clock),
        }
    }

    /// The statements store.
    pub fn financials(&self) -> &TtlStore<F> {
        &self.financials
    }

    /// The forecasts store.
    pub fn forecasts(&self) -> &TtlStore<E> {
        &self.forecasts
    }

    /// Drop one symbol's entry for the given kind.
    pub async fn invalidate(&self, symbol: &Symbol, kind: DataKind) {
        match kind {
            DataKind::Financials => self.financials.invalidate(symbol).await,
            DataKind::Forecast => self.forecasts.invalidate(symbol).await,
        }
    }

    /// Drop everything.
    pub async fn clear(&self) {
        self.financials.clear().await;
        self.forecasts.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Manually advanced clock.
    struct TestClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl TestClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc.with_ymd_and_hms(2025, 8, 26, 9, 0, 0).unwrap()),
            })
        }

        fn advance(&self, hours: i64) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::hours(hours);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn ttl_12h() -> Duration {
        Duration::from_secs(12 * 3600)
    }

    fn symbol() -> Symbol {
        Symbol::parse("NVDA").unwrap()
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_fetch() {
        let clock = TestClock::new();
        let store: TtlStore<String> = TtlStore::new(ttl_12h(), clock.clone());
        let fetches = AtomicUsize::new(0);

        let first = store
            .get_or_fetch(&symbol(), false, || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok("payload-1".to_string())
            })
            .await
            .unwrap();
        assert_eq!(first.status, CacheStatus::Fetched);

        clock.advance(11);
        let second = store
            .get_or_fetch(&symbol(), false, || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok("payload-2".to_string())
            })
            .await
            .unwrap();
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(second.payload, "payload-1");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_refetches() {
        let clock = TestClock::new();
        let store: TtlStore<String> = TtlStore::new(ttl_12h(), clock.clone());

        store
            .get_or_fetch(&symbol(), false, || async { Ok("old".to_string()) })
            .await
            .unwrap();

        clock.advance(13);
        let refreshed = store
            .get_or_fetch(&symbol(), false, || async { Ok("new".to_string()) })
            .await
            .unwrap();
        assert_eq!(refreshed.status, CacheStatus::Fetched);
        assert_eq!(refreshed.payload, "new");
    }

    #[tokio::test]
    async fn test_force_bypasses_fresh_entry() {
        let clock = TestClock::new();
        let store: TtlStore<String> = TtlStore::new(ttl_12h(), clock);

        store
            .get_or_fetch(&symbol(), false, || async { Ok("old".to_string()) })
            .await
            .unwrap();

        let forced = store
            .get_or_fetch(&symbol(), true, || async { Ok("forced".to_string()) })
            .await
            .unwrap();
        assert_eq!(forced.status, CacheStatus::Fetched);
        assert_eq!(forced.payload, "forced");
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_stale() {
        let clock = TestClock::new();
        let store: TtlStore<String> = TtlStore::new(ttl_12h(), clock.clone());

        store
            .get_or_fetch(&symbol(), false, || async { Ok("kept".to_string()) })
            .await
            .unwrap();

        clock.advance(24);
        let stale = store
            .get_or_fetch(&symbol(), false, || async {
                Err(SourceError::Timeout)
            })
            .await
            .unwrap();
        assert_eq!(stale.status, CacheStatus::StaleAfterError);
        assert_eq!(stale.payload, "kept");
        assert!(stale.error.is_some());

        // the stale entry survives for the next attempt too
        let again = store
            .get_or_fetch(&symbol(), true, || async {
                Err(SourceError::Timeout)
            })
            .await
            .unwrap();
        assert_eq!(again.payload, "kept");
    }

    #[tokio::test]
    async fn test_failure_without_history_propagates() {
        let clock = TestClock::new();
        let store: TtlStore<String> = TtlStore::new(ttl_12h(), clock);

        let result = store
            .get_or_fetch(&symbol(), false, || async {
                Err(SourceError::Timeout)
            })
            .await;
        assert!(matches!(result, Err(SourceError::Timeout)));
    }

    #[tokio::test]
    async fn test_invalidate_by_kind() {
        let clock = TestClock::new();
        let cache: FinancialCache<String, String> = FinancialCache::new(ttl_12h(), clock);

        cache
            .financials()
            .get_or_fetch(&symbol(), false, || async { Ok("fin".to_string()) })
            .await
            .unwrap();
        cache
            .forecasts()
            .get_or_fetch(&symbol(), false, || async { Ok("fc".to_string()) })
            .await
            .unwrap();

        cache.invalidate(&symbol(), DataKind::Financials).await;

        let fin = cache
            .financials()
            .get_or_fetch(&symbol(), false, || async { Ok("fin-2".to_string()) })
            .await
            .unwrap();
        assert_eq!(fin.status, CacheStatus::Fetched);

        let fc = cache
            .forecasts()
            .get_or_fetch(&symbol(), false, || async { Ok("unused".to_string()) })
            .await
            .unwrap();
        assert_eq!(fc.status, CacheStatus::Hit);
        assert_eq!(fc.payload, "fc");
    }
}
