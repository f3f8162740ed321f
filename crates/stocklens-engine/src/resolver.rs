//! Field resolver: fallback chains with provenance
//!
//! One symbol in, one snapshot out. Every section tries its providers in
//! priority order, records a warning for each failed attempt, and leaves
//! fields missing rather than defaulting them. Only a symbol where nothing
//! resolves at all becomes an error.

use crate::cache::{CacheStatus, FinancialCache};
use crate::error::EngineError;
use crate::expectation;
use chrono::Datelike;
use std::sync::Arc;
use stocklens_core::field::{first_resolved, tag_opt};
use stocklens_core::num;
use stocklens_core::snapshot::{
    ForecastOutlook, LatestFinancials, PeriodType, RealtimeQuote, SecuritySnapshot, StatementRow,
    ValuationRatios,
};
use stocklens_core::warning::dedupe_warnings;
use stocklens_core::{currency, MetricField, Provenance, SourceWarning, Symbol};
use stocklens_sources::feeds::{
    ChartFeed, ChartSeries, EstimatesData, EstimatesFeed, FinancialsData, FinancialsFeed,
    NewsFeed, QuoteData, QuoteFeed, ValuationFeed,
};
use tracing::{debug, instrument};

/// Trading-day lookbacks for momentum fields.
const MOMENTUM_WINDOWS: [usize; 3] = [5, 20, 250];

/// Year-over-year row matching tolerance, in days.
const YOY_TOLERANCE_DAYS: i64 = 45;

/// A symbol that resolved nothing, with the per-source diagnostics that
/// were gathered on the way there.
#[derive(Debug)]
pub struct ResolveFailure {
    pub error: EngineError,
    pub warnings: Vec<SourceWarning>,
}

impl ResolveFailure {
    pub fn bare(error: EngineError) -> Self {
        Self {
            error,
            warnings: Vec::new(),
        }
    }
}

/// The feed set the resolver draws from.
pub struct ResolverFeeds {
    pub primary_quotes: Arc<dyn QuoteFeed>,
    pub fallback_quotes: Arc<dyn QuoteFeed>,
    pub charts: Arc<dyn ChartFeed>,
    pub financials: Arc<dyn FinancialsFeed>,
    pub estimates: Arc<dyn EstimatesFeed>,
    pub valuation: Arc<dyn ValuationFeed>,
    pub primary_news: Arc<dyn NewsFeed>,
    pub fallback_news: Arc<dyn NewsFeed>,
}

/// Resolves one symbol into a [`SecuritySnapshot`].
pub struct FieldResolver {
    feeds: ResolverFeeds,
    cache: FinancialCache<FinancialsData, EstimatesData>,
    news_items: usize,
}

impl FieldResolver {
    pub fn new(
        feeds: ResolverFeeds,
        cache: FinancialCache<FinancialsData, EstimatesData>,
        news_items: usize,
    ) -> Self {
        Self {
            feeds,
            cache,
            news_items,
        }
    }

    /// Resolve every section for one symbol.
    ///
    /// `force_financial_refresh` bypasses the cache TTL for statements and
    /// forecasts. Warnings are embedded in the returned snapshot; when
    /// nothing resolves at all they travel with the failure instead, so
    /// the caller still sees which sources failed and how.
    #[instrument(skip(self), fields(symbol = %symbol))]
    pub async fn resolve(
        &self,
        symbol: &Symbol,
        force_financial_refresh: bool,
    ) -> std::result::Result<SecuritySnapshot, ResolveFailure> {
        let mut snapshot = SecuritySnapshot::empty(symbol.clone());
        let mut warnings: Vec<SourceWarning> = Vec::new();

        let chart = self.fetch_chart(symbol, &mut warnings).await;
        self.resolve_realtime(symbol, chart.as_ref(), &mut snapshot, &mut warnings)
            .await;
        self.resolve_financials(symbol, force_financial_refresh, &mut snapshot, &mut warnings)
            .await;
        self.resolve_forecast(symbol, force_financial_refresh, &mut snapshot, &mut warnings)
            .await;
        self.resolve_valuation(symbol, &mut snapshot, &mut warnings)
            .await;
        self.resolve_news(symbol, &mut snapshot, &mut warnings).await;

        if snapshot.currency.quote.is_none() {
            snapshot.currency.quote = currency::infer_from_symbol(symbol);
        }

        if snapshot.is_vacant() {
            debug!(symbol = %symbol, "no section resolved, reporting symbol as invalid");
            return Err(ResolveFailure {
                error: EngineError::SymbolInvalid(symbol.to_string()),
                warnings: dedupe_warnings(warnings),
            });
        }

        snapshot.warnings = dedupe_warnings(warnings);
        Ok(snapshot)
    }

    async fn fetch_chart(
        &self,
        symbol: &Symbol,
        warnings: &mut Vec<SourceWarning>,
    ) -> Option<ChartSeries> {
        match self.feeds.charts.daily_history(symbol).await {
            Ok(series) => Some(series),
            Err(err) => {
                warnings.push(err.to_warning("yahoo.chart"));
                None
            }
        }
    }

    // ===== Realtime =====

    async fn resolve_realtime(
        &self,
        symbol: &Symbol,
        chart: Option<&ChartSeries>,
        snapshot: &mut SecuritySnapshot,
        warnings: &mut Vec<SourceWarning>,
    ) {
        // Strategy list in priority order: primary feed, fallback feed,
        // chart derivation. A primary answer without a price falls through
        // like a failure.
        let primary = match self.feeds.primary_quotes.quote(symbol).await {
            Ok(data) if data.price.is_some() => Some(data),
            Ok(_) => {
                warnings.push(SourceWarning::new("finnhub/quote", "quote had no price"));
                None
            }
            Err(err) => {
                warnings.push(err.to_warning("finnhub/quote"));
                None
            }
        };

        let fallback = if primary.is_some() {
            None
        } else {
            match self.feeds.fallback_quotes.quote(symbol).await {
                Ok(data) => Some(data),
                Err(err) => {
                    warnings.push(err.to_warning("yahoo/quote"));
                    None
                }
            }
        };

        let realtime = &mut snapshot.realtime;
        merge_quote(realtime, primary.as_ref(), Provenance::Finnhub);
        merge_quote(realtime, fallback.as_ref(), Provenance::Yahoo);

        snapshot.currency.quote = primary
            .as_ref()
            .and_then(|q| q.currency.as_deref())
            .or_else(|| fallback.as_ref().and_then(|q| q.currency.as_deref()))
            .and_then(currency::normalize_code);

        if let Some(series) = chart {
            derive_from_chart(realtime, series);
        }

        // Turnover needs price and volume from whichever sources supplied them.
        if realtime.turnover_b.is_none() {
            let volume = primary
                .as_ref()
                .and_then(|q| q.volume)
                .map(|v| (v, Provenance::Finnhub))
                .or_else(|| {
                    fallback
                        .as_ref()
                        .and_then(|q| q.volume)
                        .map(|v| (v, Provenance::Yahoo))
                })
                .or_else(|| {
                    chart
                        .and_then(ChartSeries::last)
                        .map(|bar| (bar.volume as f64, Provenance::DerivedChart))
                });
            if let (Some(price), Some((volume, source))) = (realtime.price.as_ref(), volume) {
                realtime.turnover_b =
                    num::to_billions(price.value * volume).map(|t| MetricField::new(t, source));
            }
        }
    }

    // ===== Financials =====

    async fn resolve_financials(
        &self,
        symbol: &Symbol,
        force: bool,
        snapshot: &mut SecuritySnapshot,
        warnings: &mut Vec<SourceWarning>,
    ) {
        let feed = self.feeds.financials.clone();
        let lookup = self
            .cache
            .financials()
            .get_or_fetch(symbol, force, || async move {
                feed.financials(symbol).await
            })
            .await;

        let data = match lookup {
            Ok(lookup) => {
                if lookup.status == CacheStatus::StaleAfterError {
                    if let Some(err) = lookup.error {
                        warnings.push(stale_warning("yahoo/financials", &err));
                    }
                }
                lookup.payload
            }
            Err(err) => {
                warnings.push(err.to_warning("yahoo/financials"));
                return;
            }
        };

        snapshot.currency.financial = data.currency.as_deref().and_then(currency::normalize_code);
        snapshot.financials = build_latest_financials(&data);
    }

    // ===== Forecast and expectation =====

    async fn resolve_forecast(
        &self,
        symbol: &Symbol,
        force: bool,
        snapshot: &mut SecuritySnapshot,
        warnings: &mut Vec<SourceWarning>,
    ) {
        let feed = self.feeds.estimates.clone();
        let lookup = self
            .cache
            .forecasts()
            .get_or_fetch(symbol, force, || async move {
                feed.estimates(symbol).await
            })
            .await;

        let data = match lookup {
            Ok(lookup) => {
                if lookup.status == CacheStatus::StaleAfterError {
                    if let Some(err) = lookup.error {
                        warnings.push(stale_warning("yahoo/estimates", &err));
                    }
                }
                lookup.payload
            }
            Err(err) => {
                warnings.push(err.to_warning("yahoo/estimates"));
                return;
            }
        };

        snapshot.currency.forecast = data.currency.as_deref().and_then(currency::normalize_code);
        snapshot.forecast = ForecastOutlook {
            eps_current_year: first_resolved([tag_opt(data.eps_current_year, Provenance::Yahoo)]),
            eps_next_year: first_resolved([tag_opt(data.eps_next_year, Provenance::Yahoo)]),
            eps_next_quarter: first_resolved([tag_opt(data.eps_next_quarter, Provenance::Yahoo)]),
            next_earnings_date: tag_opt(data.next_earnings_date, Provenance::Yahoo),
        };
        snapshot.expectation = expectation::summarize(&data.earnings_history, &data.eps_trend);
    }

    // ===== Valuation =====

    async fn resolve_valuation(
        &self,
        symbol: &Symbol,
        snapshot: &mut SecuritySnapshot,
        warnings: &mut Vec<SourceWarning>,
    ) {
        match self.feeds.valuation.valuation(symbol).await {
            Ok(data) => {
                snapshot.valuation = ValuationRatios {
                    forward_pe: tag_opt(data.forward_pe, Provenance::YahooPage),
                    peg: tag_opt(data.peg, Provenance::YahooPage),
                    ev_to_ebitda: tag_opt(data.ev_to_ebitda, Provenance::YahooPage),
                    price_to_sales: tag_opt(data.price_to_sales, Provenance::YahooPage),
                    price_to_book: tag_opt(data.price_to_book, Provenance::YahooPage),
                };
            }
            Err(err) => warnings.push(err.to_warning("yahoo.page/valuation")),
        }
    }

    // ===== News =====

    async fn resolve_news(
        &self,
        symbol: &Symbol,
        snapshot: &mut SecuritySnapshot,
        warnings: &mut Vec<SourceWarning>,
    ) {
        match self.feeds.primary_news.news(symbol, self.news_items).await {
            Ok(items) if !items.is_empty() => {
                snapshot.news = items;
                return;
            }
            Ok(_) => warnings.push(SourceWarning::new("finnhub/news", "no articles returned")),
            Err(err) => warnings.push(err.to_warning("finnhub/news")),
        }

        match self.feeds.fallback_news.news(symbol, self.news_items).await {
            Ok(items) => snapshot.news = items,
            Err(err) => warnings.push(err.to_warning("yahoo/news")),
        }
    }
}

fn stale_warning(source: &str, err: &stocklens_sources::SourceError) -> SourceWarning {
    let base = err.to_warning(source);
    SourceWarning {
        message: format!("refresh failed, using cached data: {}", base.message),
        ..base
    }
}

/// Fill missing realtime fields from one provider's answer, tagging each
/// with that provider. Fields already resolved keep their higher-priority
/// value.
fn merge_quote(realtime: &mut RealtimeQuote, data: Option<&QuoteData>, source: Provenance) {
    let Some(data) = data else { return };

    if realtime.name.is_none() {
        realtime.name = data.name.clone().map(|n| MetricField::new(n, source));
    }
    if realtime.trade_date.is_none() {
        realtime.trade_date = tag_opt(data.trade_date, source);
    }
    if realtime.price.is_none() {
        realtime.price = tag_opt(data.price, source);
    }
    if realtime.change_pct.is_none() {
        realtime.change_pct = tag_opt(data.change_pct, source).or_else(|| {
            let (price, prev) = (data.price?, data.prev_close?);
            tag_opt(num::pct_change(price, prev), source)
        });
    }
    if realtime.market_cap_b.is_none() {
        realtime.market_cap_b = tag_opt(data.market_cap.and_then(num::to_billions), source);
    }
    if realtime.pe_ttm.is_none() {
        realtime.pe_ttm = tag_opt(data.pe_ttm.map(num::round2), source);
    }
}

/// Derive price, momentum and trade date from the close series when no
/// direct source supplied them.
fn derive_from_chart(realtime: &mut RealtimeQuote, series: &ChartSeries) {
    let Some(last) = series.last() else { return };

    if realtime.price.is_none() {
        realtime.price = Some(MetricField::new(last.close, Provenance::DerivedChart));
        realtime.trade_date = realtime
            .trade_date
            .take()
            .or(Some(MetricField::new(last.date, Provenance::DerivedChart)));
    }
    if realtime.change_pct.is_none() {
        realtime.change_pct = num::pct_change(last.close, series.close_n_days_back(1).unwrap_or(0.0))
            .map(|c| MetricField::new(c, Provenance::DerivedChart));
    }

    let windows = [
        &mut realtime.change_5d_pct,
        &mut realtime.change_20d_pct,
        &mut realtime.change_250d_pct,
    ];
    for (slot, days) in windows.into_iter().zip(MOMENTUM_WINDOWS) {
        if slot.is_none() {
            *slot = series
                .close_n_days_back(days)
                .and_then(|old| num::pct_change(last.close, old))
                .map(|c| MetricField::new(c, Provenance::DerivedChart));
        }
    }
}

/// Derive the latest-financials section from statement rows.
fn build_latest_financials(data: &FinancialsData) -> LatestFinancials {
    let latest = newest_row(&data.rows, PeriodType::Quarterly)
        .or_else(|| newest_row(&data.rows, PeriodType::Annual));

    let mut section = LatestFinancials {
        history: data.rows.clone(),
        gross_margin_pct: tag_opt(data.gross_margin_pct, Provenance::Yahoo),
        operating_margin_pct: tag_opt(data.operating_margin_pct, Provenance::Yahoo),
        net_margin_pct: tag_opt(data.net_margin_pct, Provenance::Yahoo),
        roe_pct: tag_opt(data.roe_pct, Provenance::Yahoo),
        ..LatestFinancials::default()
    };

    let Some(latest) = latest else {
        return section;
    };

    section.period_end = Some(MetricField::new(latest.period_end, Provenance::Yahoo));
    section.period_type = Some(latest.period_type);
    section.revenue_b = tag_opt(latest.revenue_b, Provenance::Yahoo);
    section.net_income_b = tag_opt(latest.net_income_b, Provenance::Yahoo);
    section.eps = tag_opt(latest.diluted_eps, Provenance::Yahoo);

    // Statement-level margins win over provider TTM ratios.
    section.gross_margin_pct =
        tag_opt(latest.gross_margin_pct, Provenance::Yahoo).or(section.gross_margin_pct);
    section.operating_margin_pct =
        tag_opt(latest.operating_margin_pct, Provenance::Yahoo).or(section.operating_margin_pct);
    section.net_margin_pct =
        tag_opt(latest.net_margin_pct, Provenance::Yahoo).or(section.net_margin_pct);

    if let Some(prior) = year_ago_row(&data.rows, latest) {
        section.revenue_yoy_pct = tag_opt(
            yoy(latest.revenue_b, prior.revenue_b),
            Provenance::Yahoo,
        );
        section.net_income_yoy_pct = tag_opt(
            yoy(latest.net_income_b, prior.net_income_b),
            Provenance::Yahoo,
        );
    }

    section
}

fn newest_row(rows: &[StatementRow], period_type: PeriodType) -> Option<&StatementRow> {
    rows.iter()
        .filter(|r| r.period_type == period_type)
        .max_by_key(|r| r.period_end)
}

/// The row of the same period type ending closest to one year before `latest`.
fn year_ago_row<'a>(rows: &'a [StatementRow], latest: &StatementRow) -> Option<&'a StatementRow> {
    let target = latest
        .period_end
        .with_year(latest.period_end.year() - 1)?;
    rows.iter()
        .filter(|r| r.period_type == latest.period_type && r.period_end != latest.period_end)
        .filter(|r| {
            (r.period_end.signed_duration_since(target)).num_days().abs() <= YOY_TOLERANCE_DAYS
        })
        .max_by_key(|r| r.period_end)
}

fn yoy(new: Option<f64>, old: Option<f64>) -> Option<f64> {
    num::pct_change(new?, old?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(period_end: NaiveDate, period_type: PeriodType, revenue_b: f64) -> StatementRow {
        StatementRow {
            period_end,
            period_type,
            revenue_b: Some(revenue_b),
            gross_margin_pct: None,
            operating_margin_pct: None,
            net_margin_pct: None,
            net_income_b: Some(revenue_b / 4.0),
            diluted_eps: None,
            operating_cash_flow_b: None,
            free_cash_flow_b: None,
        }
    }

    #[test]
    fn test_merge_quote_respects_priority() {
        let mut realtime = RealtimeQuote::default();
        let primary = QuoteData {
            price: Some(100.0),
            ..QuoteData::default()
        };
        let fallback = QuoteData {
            price: Some(999.0),
            pe_ttm: Some(25.0),
            ..QuoteData::default()
        };

        merge_quote(&mut realtime, Some(&primary), Provenance::Finnhub);
        merge_quote(&mut realtime, Some(&fallback), Provenance::Yahoo);

        let price = realtime.price.unwrap();
        assert_eq!(price.value, 100.0);
        assert_eq!(price.source, Provenance::Finnhub);
        // primary had no PE, so the fallback fills it with its own provenance
        assert_eq!(realtime.pe_ttm.unwrap().source, Provenance::Yahoo);
    }

    #[test]
    fn test_merge_quote_derives_change_from_closes() {
        let mut realtime = RealtimeQuote::default();
        let data = QuoteData {
            price: Some(110.0),
            prev_close: Some(100.0),
            ..QuoteData::default()
        };
        merge_quote(&mut realtime, Some(&data), Provenance::Yahoo);
        assert_eq!(realtime.change_pct.unwrap().value, 10.0);
    }

    #[test]
    fn test_derive_from_chart_momentum() {
        use stocklens_sources::feeds::ChartBar;
        let series = ChartSeries {
            bars: (0..260i32)
                .map(|i| ChartBar {
                    date: date(2024, 8, 1) + chrono::Duration::days(i64::from(i)),
                    close: 100.0 + f64::from(i),
                    volume: 1_000_000,
                })
                .collect(),
        };

        let mut realtime = RealtimeQuote::default();
        derive_from_chart(&mut realtime, &series);

        assert_eq!(realtime.price.unwrap().source, Provenance::DerivedChart);
        assert!(realtime.change_5d_pct.is_some());
        assert!(realtime.change_20d_pct.is_some());
        assert!(realtime.change_250d_pct.is_some());
    }

    #[test]
    fn test_derive_from_chart_keeps_existing_fields() {
        use stocklens_sources::feeds::ChartBar;
        let series = ChartSeries {
            bars: vec![ChartBar {
                date: date(2025, 8, 25),
                close: 50.0,
                volume: 10,
            }],
        };
        let mut realtime = RealtimeQuote {
            price: Some(MetricField::new(187.0, Provenance::Finnhub)),
            ..RealtimeQuote::default()
        };
        derive_from_chart(&mut realtime, &series);
        assert_eq!(realtime.price.unwrap().source, Provenance::Finnhub);
    }

    #[test]
    fn test_latest_financials_prefers_quarterly_and_computes_yoy() {
        let data = FinancialsData {
            currency: Some("USD".to_string()),
            rows: vec![
                row(date(2024, 12, 31), PeriodType::Annual, 400.0),
                row(date(2025, 6, 30), PeriodType::Quarterly, 120.0),
                row(date(2024, 6, 30), PeriodType::Quarterly, 100.0),
            ],
            gross_margin_pct: Some(60.0),
            operating_margin_pct: None,
            net_margin_pct: None,
            roe_pct: Some(35.0),
        };

        let section = build_latest_financials(&data);
        assert_eq!(section.period_type, Some(PeriodType::Quarterly));
        assert_eq!(section.revenue_b.unwrap().value, 120.0);
        assert_eq!(section.revenue_yoy_pct.unwrap().value, 20.0);
        assert_eq!(section.roe_pct.unwrap().value, 35.0);
        assert_eq!(section.history.len(), 3);
    }

    #[test]
    fn test_yoy_missing_without_comparable_row() {
        let data = FinancialsData {
            rows: vec![row(date(2025, 6, 30), PeriodType::Quarterly, 120.0)],
            ..FinancialsData::default()
        };
        let section = build_latest_financials(&data);
        assert!(section.revenue_yoy_pct.is_none());
        assert!(section.revenue_b.is_some());
    }
}
