//! Per-security snapshot assembled by the aggregation engine
//!
//! Field-level `Option<MetricField<T>>` is the missing-data contract: a
//! `None` field means no source supplied a usable value and the renderer
//! must show it as unavailable. Nothing in here invents defaults.

use crate::field::MetricField;
use crate::symbol::Symbol;
use crate::warning::SourceWarning;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Reporting period granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Annual,
    Quarterly,
}

/// Currency codes attached to the snapshot sections.
///
/// Quote and financial currencies can differ (e.g. HKD quote with USD
/// statements); each is resolved independently with the symbol-suffix map
/// as the last fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyBlock {
    /// Currency of the live quote
    pub quote: Option<String>,
    /// Currency of reported statements
    pub financial: Option<String>,
    /// Currency of forward estimates
    pub forecast: Option<String>,
}

/// Live market section of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeQuote {
    /// Company display name
    pub name: Option<MetricField<String>>,
    /// Date of the most recent trade
    pub trade_date: Option<MetricField<NaiveDate>>,
    /// Last traded price
    pub price: Option<MetricField<f64>>,
    /// Percent change vs previous close
    pub change_pct: Option<MetricField<f64>>,
    /// Market capitalization in billions
    pub market_cap_b: Option<MetricField<f64>>,
    /// Day turnover (price x volume) in billions
    pub turnover_b: Option<MetricField<f64>>,
    /// Trailing-twelve-month price/earnings
    pub pe_ttm: Option<MetricField<f64>>,
    /// 5 trading-day change percent
    pub change_5d_pct: Option<MetricField<f64>>,
    /// 20 trading-day change percent
    pub change_20d_pct: Option<MetricField<f64>>,
    /// 250 trading-day change percent
    pub change_250d_pct: Option<MetricField<f64>>,
}

/// One historical statement row (annual or quarterly context).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRow {
    /// Period end date
    pub period_end: NaiveDate,
    pub period_type: PeriodType,
    /// Revenue in billions
    pub revenue_b: Option<f64>,
    pub gross_margin_pct: Option<f64>,
    pub operating_margin_pct: Option<f64>,
    pub net_margin_pct: Option<f64>,
    /// Net income in billions
    pub net_income_b: Option<f64>,
    pub diluted_eps: Option<f64>,
    /// Operating cash flow in billions
    pub operating_cash_flow_b: Option<f64>,
    /// Free cash flow in billions
    pub free_cash_flow_b: Option<f64>,
}

/// Latest reported financials plus multi-period history context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatestFinancials {
    /// End date of the most recent reported period
    pub period_end: Option<MetricField<NaiveDate>>,
    /// Whether the latest period is annual or quarterly
    pub period_type: Option<PeriodType>,
    /// Revenue in billions
    pub revenue_b: Option<MetricField<f64>>,
    /// Revenue change vs the same period a year earlier
    pub revenue_yoy_pct: Option<MetricField<f64>>,
    /// Net income in billions
    pub net_income_b: Option<MetricField<f64>>,
    /// Net income change vs the same period a year earlier
    pub net_income_yoy_pct: Option<MetricField<f64>>,
    /// Diluted earnings per share
    pub eps: Option<MetricField<f64>>,
    pub gross_margin_pct: Option<MetricField<f64>>,
    pub operating_margin_pct: Option<MetricField<f64>>,
    pub net_margin_pct: Option<MetricField<f64>>,
    pub roe_pct: Option<MetricField<f64>>,
    /// Recent annual and quarterly rows for trend context
    pub history: Vec<StatementRow>,
}

/// Forward-looking analyst estimates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutlook {
    /// Consensus EPS for the current fiscal year
    pub eps_current_year: Option<MetricField<f64>>,
    /// Consensus EPS for the next fiscal year
    pub eps_next_year: Option<MetricField<f64>>,
    /// Consensus EPS for the next quarter
    pub eps_next_quarter: Option<MetricField<f64>>,
    /// Next scheduled earnings date
    pub next_earnings_date: Option<MetricField<NaiveDate>>,
}

/// Valuation multiples from the page-parse provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationRatios {
    pub forward_pe: Option<MetricField<f64>>,
    pub peg: Option<MetricField<f64>>,
    pub ev_to_ebitda: Option<MetricField<f64>>,
    pub price_to_sales: Option<MetricField<f64>>,
    pub price_to_book: Option<MetricField<f64>>,
}

/// One reported quarter's EPS outcome vs consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsHistoryRow {
    /// Quarter end date
    pub quarter: NaiveDate,
    pub eps_actual: Option<f64>,
    pub eps_estimate: Option<f64>,
    /// Surprise percent as reported (positive = beat)
    pub surprise_pct: Option<f64>,
}

/// Consensus EPS estimate revisions for one forecast period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpsTrendRow {
    /// Period token as reported, e.g. `0y`, `+1y`, `+1q`
    pub period: String,
    pub current: Option<f64>,
    pub days7_ago: Option<f64>,
    pub days30_ago: Option<f64>,
    pub days60_ago: Option<f64>,
    pub days90_ago: Option<f64>,
}

/// How the latest reported EPS compared to consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurpriseVerdict {
    Beat,
    Miss,
    Inline,
    /// Inputs missing or not numeric
    Insufficient,
}

/// Direction of consensus EPS revisions over a lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendSignal {
    StronglyUp,
    Up,
    Flat,
    Down,
    StronglyDown,
    /// Fewer than two usable points in the window
    Insufficient,
}

/// Expectation-vs-results summary computed from cached estimate history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationGuidance {
    /// Verdict for the most recent reported quarter
    pub last_verdict: SurpriseVerdict,
    /// Beat count over the trailing four quarters
    pub beat_count: u8,
    /// Miss count over the trailing four quarters
    pub miss_count: u8,
    /// Inline count over the trailing four quarters
    pub inline_count: u8,
    /// Consecutive beats ending at the latest quarter
    pub beat_streak: u8,
    /// Average surprise percent over the trailing four quarters
    pub avg_surprise_pct: Option<f64>,
    /// Revision signal vs the 7-day-ago consensus
    pub trend_7d: TrendSignal,
    /// Revision signal vs the 30-day-ago consensus
    pub trend_30d: TrendSignal,
    /// Revision signal vs the 60-day-ago consensus
    pub trend_60d: TrendSignal,
    /// Revision signal vs the 90-day-ago consensus
    pub trend_90d: TrendSignal,
    /// One-line qualitative conclusion
    pub conclusion: String,
}

impl Default for ExpectationGuidance {
    fn default() -> Self {
        Self {
            last_verdict: SurpriseVerdict::Insufficient,
            beat_count: 0,
            miss_count: 0,
            inline_count: 0,
            beat_streak: 0,
            avg_surprise_pct: None,
            trend_7d: TrendSignal::Insufficient,
            trend_30d: TrendSignal::Insufficient,
            trend_60d: TrendSignal::Insufficient,
            trend_90d: TrendSignal::Insufficient,
            conclusion: String::new(),
        }
    }
}

/// One news headline attached to the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub publisher: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// The complete aggregated view of one security.
///
/// Assembled once per request by the resolver and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuritySnapshot {
    pub symbol: Symbol,
    pub currency: CurrencyBlock,
    pub realtime: RealtimeQuote,
    pub financials: LatestFinancials,
    pub forecast: ForecastOutlook,
    pub valuation: ValuationRatios,
    pub expectation: ExpectationGuidance,
    pub news: Vec<NewsItem>,
    /// Non-fatal source failures encountered while resolving this symbol
    pub warnings: Vec<SourceWarning>,
}

impl SecuritySnapshot {
    /// An empty snapshot shell for the given symbol.
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            currency: CurrencyBlock::default(),
            realtime: RealtimeQuote::default(),
            financials: LatestFinancials::default(),
            forecast: ForecastOutlook::default(),
            valuation: ValuationRatios::default(),
            expectation: ExpectationGuidance::default(),
            news: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// True when no section resolved any data at all.
    ///
    /// A snapshot in this state is reported as a per-symbol failure rather
    /// than returned to the caller.
    pub fn is_vacant(&self) -> bool {
        self.realtime.price.is_none()
            && self.financials.revenue_b.is_none()
            && self.financials.eps.is_none()
            && self.forecast.eps_current_year.is_none()
            && self.forecast.eps_next_year.is_none()
    }
}
