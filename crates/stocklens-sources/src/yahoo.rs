//! Yahoo Finance clients: chart history, quote fallback, financials, estimates

use crate::error::{Result, SourceError};
use crate::feeds::{
    ChartBar, ChartFeed, ChartSeries, EstimatesData, EstimatesFeed, FinancialsData,
    FinancialsFeed, QuoteData, QuoteFeed,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration as StdDuration;
use stocklens_core::num::{self, to_pct};
use stocklens_core::snapshot::{EarningsHistoryRow, EpsTrendRow, PeriodType, StatementRow};
use stocklens_core::Symbol;
use time::OffsetDateTime;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

const QUOTE_SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";

/// Desktop browser UA; Yahoo rejects the default reqwest agent.
pub(crate) const BROWSER_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

/// History depth for the daily chart (covers 250 trading days with margin).
const CHART_LOOKBACK_DAYS: i64 = 730;

const ANNUAL_ROWS: usize = 3;
const QUARTERLY_ROWS: usize = 4;

// ===== quoteSummary JSON helpers (shared with the valuation client) =====

/// Fetch one symbol's quoteSummary result object for the given modules.
pub(crate) async fn quote_summary(
    client: &Client,
    symbol: &Symbol,
    modules: &str,
) -> Result<Value> {
    let url = format!("{QUOTE_SUMMARY_URL}/{}", symbol.as_str());
    let response = client
        .get(&url)
        .query(&[("modules", modules), ("formatted", "false")])
        .header("User-Agent", BROWSER_UA)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Http {
            status: status.as_u16(),
            message: format!("quoteSummary {}: {body}", symbol.as_str()),
        });
    }

    let envelope: Value = response.json().await?;
    first_summary_result(&envelope).ok_or_else(|| {
        SourceError::Parse(format!(
            "quoteSummary returned no result for {}",
            symbol.as_str()
        ))
    })
}

/// Extract the first `quoteSummary.result` entry from an envelope.
pub(crate) fn first_summary_result(envelope: &Value) -> Option<Value> {
    envelope
        .get("quoteSummary")?
        .get("result")?
        .get(0)
        .cloned()
}

/// Read a number at `path`, unwrapping Yahoo's `{"raw": x, "fmt": ...}` shape.
pub(crate) fn jnum(value: &Value, path: &[&str]) -> Option<f64> {
    let node = walk(value, path)?;
    let raw = node.get("raw").unwrap_or(node);
    raw.as_f64().filter(|v| v.is_finite())
}

/// Read a string at `path`.
pub(crate) fn jtext(value: &Value, path: &[&str]) -> Option<String> {
    let node = walk(value, path)?;
    let raw = node.get("raw").unwrap_or(node);
    raw.as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Read a UNIX-seconds timestamp at `path` as a UTC date.
pub(crate) fn jdate(value: &Value, path: &[&str]) -> Option<NaiveDate> {
    let ts = jnum(value, path)?;
    #[allow(clippy::cast_possible_truncation)]
    DateTime::from_timestamp(ts as i64, 0).map(|dt| dt.date_naive())
}

fn walk<'a>(mut value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    for key in path {
        value = value.get(key)?;
        if value.is_null() {
            return None;
        }
    }
    Some(value)
}

// ===== Client =====

/// Yahoo Finance client covering chart, quote fallback, statements and
/// analyst estimates.
pub struct YahooClient {
    client: Client,
}

impl YahooClient {
    pub fn new(timeout: StdDuration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new(StdDuration::from_secs(20))
    }
}

#[async_trait]
impl ChartFeed for YahooClient {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn daily_history(&self, symbol: &Symbol) -> Result<ChartSeries> {
        let provider = yahoo::YahooConnector::new()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let end = Utc::now();
        let start = end - chrono::Duration::days(CHART_LOOKBACK_DAYS);
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| SourceError::Parse(format!("invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| SourceError::Parse(format!("invalid end timestamp: {e}")))?;

        let response = provider
            .get_quote_history(symbol.as_str(), start_odt, end_odt)
            .await
            .map_err(|e| SourceError::Network(format!("chart history: {e}")))?;
        let quotes = response
            .quotes()
            .map_err(|e| SourceError::Parse(format!("chart history: {e}")))?;

        let bars: Vec<ChartBar> = quotes
            .iter()
            .filter_map(|q| {
                if !num::is_usable(q.close) || q.close <= 0.0 {
                    return None;
                }
                #[allow(clippy::cast_possible_wrap)]
                let date = DateTime::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                Some(ChartBar {
                    date,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .collect();

        if bars.is_empty() {
            return Err(SourceError::NoData {
                symbol: symbol.to_string(),
                reason: "empty chart history".to_string(),
            });
        }

        debug!(symbol = %symbol, bars = bars.len(), "chart history fetched");
        Ok(ChartSeries { bars })
    }
}

#[async_trait]
impl QuoteFeed for YahooClient {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn quote(&self, symbol: &Symbol) -> Result<QuoteData> {
        let result = quote_summary(
            &self.client,
            symbol,
            "price,summaryDetail,defaultKeyStatistics",
        )
        .await?;

        let mut data = QuoteData {
            name: jtext(&result, &["price", "longName"])
                .or_else(|| jtext(&result, &["price", "shortName"])),
            trade_date: jdate(&result, &["price", "regularMarketTime"]),
            price: jnum(&result, &["price", "regularMarketPrice"]),
            prev_close: jnum(&result, &["price", "regularMarketPreviousClose"])
                .or_else(|| jnum(&result, &["summaryDetail", "previousClose"])),
            change_pct: jnum(&result, &["price", "regularMarketChangePercent"]).and_then(to_pct),
            market_cap: jnum(&result, &["price", "marketCap"])
                .or_else(|| jnum(&result, &["summaryDetail", "marketCap"])),
            pe_ttm: jnum(&result, &["summaryDetail", "trailingPE"]),
            volume: jnum(&result, &["price", "regularMarketVolume"])
                .or_else(|| jnum(&result, &["summaryDetail", "volume"])),
            currency: jtext(&result, &["price", "currency"]),
        };

        // Trailing EPS can stand in for a missing PE.
        if data.pe_ttm.is_none() {
            if let (Some(price), Some(eps)) =
                (data.price, jnum(&result, &["defaultKeyStatistics", "trailingEps"]))
            {
                if eps > 0.0 {
                    data.pe_ttm = Some(price / eps);
                }
            }
        }

        // Module price gaps fall back to the latest chart bar.
        if data.price.is_none() || data.prev_close.is_none() {
            if let Ok(series) = self.daily_history(symbol).await {
                if data.price.is_none() {
                    data.price = series.last().map(|b| b.close);
                    data.trade_date = data.trade_date.or_else(|| series.last().map(|b| b.date));
                }
                if data.prev_close.is_none() {
                    data.prev_close = series.close_n_days_back(1);
                }
            }
        }

        if data.price.is_none() {
            return Err(SourceError::NoData {
                symbol: symbol.to_string(),
                reason: "no price in summary or chart".to_string(),
            });
        }

        if data.change_pct.is_none() {
            if let (Some(price), Some(prev)) = (data.price, data.prev_close) {
                data.change_pct = num::pct_change(price, prev);
            }
        }

        Ok(data)
    }
}

#[async_trait]
impl FinancialsFeed for YahooClient {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn financials(&self, symbol: &Symbol) -> Result<FinancialsData> {
        let result = quote_summary(
            &self.client,
            symbol,
            "incomeStatementHistory,incomeStatementHistoryQuarterly,\
             cashflowStatementHistory,cashflowStatementHistoryQuarterly,\
             financialData,defaultKeyStatistics",
        )
        .await?;

        let shares = jnum(&result, &["defaultKeyStatistics", "sharesOutstanding"]);

        let annual = statement_rows(
            &result,
            &["incomeStatementHistory", "incomeStatementHistory"],
            &["cashflowStatementHistory", "cashflowStatements"],
            PeriodType::Annual,
            ANNUAL_ROWS,
            shares,
        );
        let quarterly = statement_rows(
            &result,
            &["incomeStatementHistoryQuarterly", "incomeStatementHistory"],
            &["cashflowStatementHistoryQuarterly", "cashflowStatements"],
            PeriodType::Quarterly,
            QUARTERLY_ROWS,
            shares,
        );

        let mut rows = annual;
        rows.extend(quarterly);
        if rows.is_empty() {
            return Err(SourceError::NoData {
                symbol: symbol.to_string(),
                reason: "no statement history".to_string(),
            });
        }

        Ok(FinancialsData {
            currency: jtext(&result, &["financialData", "financialCurrency"]),
            rows,
            gross_margin_pct: jnum(&result, &["financialData", "grossMargins"]).and_then(to_pct),
            operating_margin_pct: jnum(&result, &["financialData", "operatingMargins"])
                .and_then(to_pct),
            net_margin_pct: jnum(&result, &["financialData", "profitMargins"]).and_then(to_pct),
            roe_pct: jnum(&result, &["financialData", "returnOnEquity"]).and_then(to_pct),
        })
    }
}

/// Build statement rows by joining income and cash-flow entries on period end.
fn statement_rows(
    result: &Value,
    income_path: &[&str],
    cashflow_path: &[&str],
    period_type: PeriodType,
    limit: usize,
    shares: Option<f64>,
) -> Vec<StatementRow> {
    let income = walk_array(result, income_path);
    let cashflow = walk_array(result, cashflow_path);

    income
        .iter()
        .take(limit)
        .filter_map(|entry| {
            let period_end = jdate(entry, &["endDate"])?;
            let revenue = jnum(entry, &["totalRevenue"]);
            let gross = jnum(entry, &["grossProfit"]);
            let operating = jnum(entry, &["operatingIncome"]);
            let net_income = jnum(entry, &["netIncome"]);

            let cf = cashflow
                .iter()
                .find(|c| jdate(c, &["endDate"]) == Some(period_end));
            let ocf = cf.and_then(|c| jnum(c, &["totalCashFromOperatingActivities"]));
            // capex is reported negative; FCF = OCF + capex
            let fcf = match (ocf, cf.and_then(|c| jnum(c, &["capitalExpenditures"]))) {
                (Some(o), Some(capex)) => Some(o + capex),
                _ => None,
            };

            // No per-row diluted EPS in these modules; approximate from the
            // current share count when net income is available.
            let diluted_eps = match (net_income, shares) {
                (Some(ni), Some(s)) if s > 0.0 => Some((ni / s * 100.0).round() / 100.0),
                _ => None,
            };

            Some(StatementRow {
                period_end,
                period_type,
                revenue_b: revenue.and_then(num::to_billions),
                gross_margin_pct: margin(gross, revenue),
                operating_margin_pct: margin(operating, revenue),
                net_margin_pct: margin(net_income, revenue),
                net_income_b: net_income.and_then(num::to_billions),
                diluted_eps,
                operating_cash_flow_b: ocf.and_then(num::to_billions),
                free_cash_flow_b: fcf.and_then(num::to_billions),
            })
        })
        .collect()
}

fn margin(part: Option<f64>, whole: Option<f64>) -> Option<f64> {
    num::ratio_pct(part?, whole?)
}

fn walk_array(result: &Value, path: &[&str]) -> Vec<Value> {
    let mut node = result;
    for key in path {
        match node.get(key) {
            Some(next) => node = next,
            None => return Vec::new(),
        }
    }
    node.as_array().cloned().unwrap_or_default()
}

#[async_trait]
impl EstimatesFeed for YahooClient {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn estimates(&self, symbol: &Symbol) -> Result<EstimatesData> {
        let result = quote_summary(
            &self.client,
            symbol,
            "earningsTrend,earningsHistory,calendarEvents,price",
        )
        .await?;

        let trend_entries = walk_array(&result, &["earningsTrend", "trend"]);
        let eps_for = |token: &str| -> Option<f64> {
            trend_entries
                .iter()
                .find(|t| jtext(t, &["period"]).as_deref() == Some(token))
                .and_then(|t| jnum(t, &["earningsEstimate", "avg"]))
        };

        let eps_trend: Vec<EpsTrendRow> = trend_entries
            .iter()
            .filter_map(|t| {
                let period = jtext(t, &["period"])?;
                Some(EpsTrendRow {
                    period,
                    current: jnum(t, &["epsTrend", "current"]),
                    days7_ago: jnum(t, &["epsTrend", "7daysAgo"]),
                    days30_ago: jnum(t, &["epsTrend", "30daysAgo"]),
                    days60_ago: jnum(t, &["epsTrend", "60daysAgo"]),
                    days90_ago: jnum(t, &["epsTrend", "90daysAgo"]),
                })
            })
            .collect();

        let mut earnings_history: Vec<EarningsHistoryRow> =
            walk_array(&result, &["earningsHistory", "history"])
                .iter()
                .filter_map(|h| {
                    Some(EarningsHistoryRow {
                        quarter: jdate(h, &["quarter"])?,
                        eps_actual: jnum(h, &["epsActual"]),
                        eps_estimate: jnum(h, &["epsEstimate"]),
                        surprise_pct: jnum(h, &["surprisePercent"]).and_then(to_pct),
                    })
                })
                .collect();
        // newest first
        earnings_history.sort_by(|a, b| b.quarter.cmp(&a.quarter));

        let today = Utc::now().date_naive();
        let next_earnings_date = walk_array(&result, &["calendarEvents", "earnings", "earningsDate"])
            .iter()
            .filter_map(|d| {
                let ts = d.get("raw").unwrap_or(d).as_f64()?;
                #[allow(clippy::cast_possible_truncation)]
                DateTime::from_timestamp(ts as i64, 0).map(|dt| dt.date_naive())
            })
            .filter(|d| *d >= today)
            .min();

        Ok(EstimatesData {
            currency: jtext(&result, &["price", "currency"]),
            eps_current_year: eps_for("0y"),
            eps_next_year: eps_for("+1y"),
            eps_next_quarter: eps_for("+1q"),
            next_earnings_date,
            earnings_history,
            eps_trend,
        })
    }
}
