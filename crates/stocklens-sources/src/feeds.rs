//! Feed trait seams between the resolver and concrete source clients
//!
//! Each trait covers one data role. The resolver only sees these traits, so
//! fallback behavior can be tested with `mockall` doubles instead of live
//! endpoints.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use stocklens_core::snapshot::{EarningsHistoryRow, EpsTrendRow, StatementRow};
use stocklens_core::{NewsItem, Symbol};

#[cfg(test)]
use mockall::automock;

/// Raw quote fields as one provider reports them.
///
/// No provenance here; the resolver tags each field with the feed that
/// actually supplied it. Absent fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteData {
    pub name: Option<String>,
    pub trade_date: Option<NaiveDate>,
    pub price: Option<f64>,
    pub prev_close: Option<f64>,
    pub change_pct: Option<f64>,
    /// Market cap in source units (absolute, not billions)
    pub market_cap: Option<f64>,
    pub pe_ttm: Option<f64>,
    /// Day volume in shares
    pub volume: Option<f64>,
    pub currency: Option<String>,
}

/// One daily bar from the historical chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: u64,
}

/// Daily close/volume history, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub bars: Vec<ChartBar>,
}

impl ChartSeries {
    /// Latest bar, if any.
    pub fn last(&self) -> Option<&ChartBar> {
        self.bars.last()
    }

    /// Close `n` trading days before the latest bar.
    pub fn close_n_days_back(&self, n: usize) -> Option<f64> {
        let len = self.bars.len();
        if len <= n {
            return None;
        }
        Some(self.bars[len - 1 - n].close)
    }
}

/// Reported statements for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialsData {
    /// Currency of the reported figures
    pub currency: Option<String>,
    /// Annual and quarterly rows, newest first within each period type
    pub rows: Vec<StatementRow>,
    /// Trailing gross margin percent, when the provider reports one
    pub gross_margin_pct: Option<f64>,
    /// Trailing operating margin percent
    pub operating_margin_pct: Option<f64>,
    /// Trailing net margin percent
    pub net_margin_pct: Option<f64>,
    /// Return on equity percent
    pub roe_pct: Option<f64>,
}

/// Forward estimates and earnings history for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatesData {
    pub currency: Option<String>,
    pub eps_current_year: Option<f64>,
    pub eps_next_year: Option<f64>,
    pub eps_next_quarter: Option<f64>,
    pub next_earnings_date: Option<NaiveDate>,
    /// Recent reported quarters vs consensus, newest first
    pub earnings_history: Vec<EarningsHistoryRow>,
    /// Consensus revision columns per forecast period
    pub eps_trend: Vec<EpsTrendRow>,
}

/// Valuation multiples from the page-parse provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationData {
    pub forward_pe: Option<f64>,
    pub peg: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub price_to_book: Option<f64>,
}

/// One normalized external web-search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Which search provider returned this item
    pub provider: String,
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Publishing site, when reported
    pub source: Option<String>,
    /// Compacted content snippet
    pub snippet: Option<String>,
}

/// Live quote provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QuoteFeed: Send + Sync {
    async fn quote(&self, symbol: &Symbol) -> Result<QuoteData>;
}

/// Daily price history provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChartFeed: Send + Sync {
    async fn daily_history(&self, symbol: &Symbol) -> Result<ChartSeries>;
}

/// Reported statements provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FinancialsFeed: Send + Sync {
    async fn financials(&self, symbol: &Symbol) -> Result<FinancialsData>;
}

/// Analyst estimates provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EstimatesFeed: Send + Sync {
    async fn estimates(&self, symbol: &Symbol) -> Result<EstimatesData>;
}

/// Valuation ratios provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ValuationFeed: Send + Sync {
    async fn valuation(&self, symbol: &Symbol) -> Result<ValuationData>;
}

/// Company news provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NewsFeed: Send + Sync {
    async fn news(&self, symbol: &Symbol, limit: usize) -> Result<Vec<NewsItem>>;
}

/// External web-search provider.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SearchFeed: Send + Sync {
    /// Provider label used for dedupe and item attribution.
    fn provider(&self) -> &'static str;

    async fn search(
        &self,
        query: &str,
        lookback_days: u32,
        limit: usize,
    ) -> Result<Vec<SearchItem>>;
}

/// Maximum snippet length after compaction.
pub const MAX_SNIPPET_LEN: usize = 260;

/// Maximum title length after compaction.
pub const MAX_TITLE_LEN: usize = 220;

/// Collapse whitespace and truncate to `max` characters on a char boundary.
pub fn compact_text(text: &str, max: usize) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", truncated.trim_end())
}

/// Drop items that repeat an earlier url or title, keeping first-seen order.
pub fn dedupe_search_items(items: Vec<SearchItem>) -> Vec<SearchItem> {
    let mut seen_urls: Vec<String> = Vec::new();
    let mut seen_titles: Vec<String> = Vec::new();
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let url_key = item.url.trim_end_matches('/').to_ascii_lowercase();
        let title_key = item.title.to_ascii_lowercase();
        if seen_urls.contains(&url_key) || seen_titles.contains(&title_key) {
            continue;
        }
        seen_urls.push(url_key);
        seen_titles.push(title_key);
        out.push(item);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(provider: &str, title: &str, url: &str) -> SearchItem {
        SearchItem {
            provider: provider.to_string(),
            title: title.to_string(),
            url: url.to_string(),
            published_at: None,
            source: None,
            snippet: None,
        }
    }

    #[test]
    fn test_compact_text_collapses_and_truncates() {
        assert_eq!(compact_text("a   b\n\tc", 100), "a b c");
        let long = "x".repeat(300);
        let compacted = compact_text(&long, MAX_SNIPPET_LEN);
        assert!(compacted.chars().count() <= MAX_SNIPPET_LEN);
        assert!(compacted.ends_with('…'));
    }

    #[test]
    fn test_dedupe_by_url_and_title() {
        let items = vec![
            item("exa", "NVIDIA earnings", "https://a.example/1"),
            item("tavily", "NVIDIA earnings", "https://b.example/2"),
            item("tavily", "Other story", "https://a.example/1/"),
            item("tavily", "Kept", "https://c.example/3"),
        ];
        let deduped = dedupe_search_items(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].provider, "exa");
        assert_eq!(deduped[1].title, "Kept");
    }

    #[test]
    fn test_chart_series_lookback() {
        let series = ChartSeries {
            bars: (0..10)
                .map(|i| ChartBar {
                    date: NaiveDate::from_ymd_opt(2025, 1, 1 + i).unwrap(),
                    close: f64::from(100 + i),
                    volume: 1000,
                })
                .collect(),
        };
        assert_eq!(series.last().unwrap().close, 109.0);
        assert_eq!(series.close_n_days_back(5), Some(104.0));
        assert_eq!(series.close_n_days_back(50), None);
    }
}
