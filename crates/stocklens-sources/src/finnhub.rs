//! Finnhub API client (primary quote and news provider)

use crate::error::{Result, SourceError};
use crate::feeds::{NewsFeed, QuoteData, QuoteFeed};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use stocklens_core::{NewsItem, Symbol};
use tracing::{debug, instrument};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const BASE_URL: &str = "https://finnhub.io/api/v1";

/// Lookback window for company news.
const NEWS_WINDOW_DAYS: i64 = 14;

// ===== Wire types (private to this client) =====

#[derive(Debug, Deserialize)]
struct QuoteWire {
    /// Current price
    c: Option<f64>,
    /// Percent change vs previous close
    dp: Option<f64>,
    /// Previous close
    pc: Option<f64>,
    /// Timestamp of the latest trade (UNIX seconds)
    t: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProfileWire {
    name: Option<String>,
    currency: Option<String>,
    /// Market capitalization in millions
    #[serde(rename = "marketCapitalization")]
    market_capitalization: Option<f64>,
    #[serde(rename = "shareOutstanding")]
    share_outstanding: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetricWire {
    metric: Option<MetricFields>,
}

#[derive(Debug, Deserialize)]
struct MetricFields {
    #[serde(rename = "peTTM")]
    pe_ttm: Option<f64>,
    #[serde(rename = "epsTTM")]
    eps_ttm: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NewsWire {
    headline: Option<String>,
    source: Option<String>,
    url: Option<String>,
    /// Publish time (UNIX seconds)
    datetime: Option<i64>,
}

// ===== Client =====

/// Finnhub client with per-minute rate limiting.
///
/// A missing API key is not a constructor error; every call fails with
/// [`SourceError::MissingCredential`] so the resolver can skip to the
/// fallback provider with a warning.
pub struct FinnhubClient {
    client: Client,
    api_key: Option<String>,
    rate_limiter: SharedRateLimiter,
}

impl FinnhubClient {
    /// Create a new Finnhub client.
    ///
    /// `rate_limit` is requests per minute (free tier: 60).
    pub fn new(api_key: Option<String>, rate_limit: u32, timeout: std::time::Duration) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::new(60).unwrap()));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            rate_limiter,
        }
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SourceError::MissingCredential("FINNHUB_API_KEY".to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let key = self.key()?;
        self.rate_limiter.until_ready().await;

        let url = format!("{BASE_URL}/{path}");
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("token", key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("Finnhub {path}: {body}"),
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Validate a configured key by fetching the AAPL quote.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<()> {
        let quote: QuoteWire = self.get_json("quote", &[("symbol", "AAPL")]).await?;
        if quote.c.is_some_and(|c| c > 0.0) {
            Ok(())
        } else {
            Err(SourceError::NoData {
                symbol: "AAPL".to_string(),
                reason: "key check returned an empty quote".to_string(),
            })
        }
    }
}

#[async_trait]
impl QuoteFeed for FinnhubClient {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn quote(&self, symbol: &Symbol) -> Result<QuoteData> {
        let ticker = symbol.as_str();
        let quote: QuoteWire = self.get_json("quote", &[("symbol", ticker)]).await?;

        // Finnhub answers unknown tickers with an all-zero quote.
        let price = quote.c.filter(|c| *c > 0.0);
        if price.is_none() {
            return Err(SourceError::NoData {
                symbol: ticker.to_string(),
                reason: "no current price".to_string(),
            });
        }

        // Profile and metric failures degrade to missing fields, not errors.
        let profile: Option<ProfileWire> = self
            .get_json("stock/profile2", &[("symbol", ticker)])
            .await
            .map_err(|e| debug!(symbol = ticker, error = %e, "profile2 unavailable"))
            .ok();
        let metric: Option<MetricWire> = self
            .get_json("stock/metric", &[("symbol", ticker), ("metric", "all")])
            .await
            .map_err(|e| debug!(symbol = ticker, error = %e, "metric unavailable"))
            .ok();

        let metric_fields = metric.and_then(|m| m.metric);
        let pe_ttm = metric_fields.as_ref().and_then(|m| m.pe_ttm).or_else(|| {
            let eps = metric_fields.as_ref().and_then(|m| m.eps_ttm)?;
            if eps > 0.0 { Some(price? / eps) } else { None }
        });

        let (name, currency, market_cap) = match profile {
            Some(p) => {
                // marketCapitalization is reported in millions
                let cap = p
                    .market_capitalization
                    .filter(|c| *c > 0.0)
                    .map(|c| c * 1_000_000.0)
                    .or_else(|| Some(price? * p.share_outstanding? * 1_000_000.0));
                (p.name, p.currency, cap)
            }
            None => (None, None, None),
        };

        Ok(QuoteData {
            name,
            trade_date: quote
                .t
                .and_then(|t| DateTime::from_timestamp(t, 0))
                .map(|dt| dt.date_naive()),
            price,
            prev_close: quote.pc.filter(|pc| *pc > 0.0),
            change_pct: quote.dp,
            market_cap,
            pe_ttm,
            volume: None,
            currency,
        })
    }
}

#[async_trait]
impl NewsFeed for FinnhubClient {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn news(&self, symbol: &Symbol, limit: usize) -> Result<Vec<NewsItem>> {
        let to = Utc::now();
        let from = to - Duration::days(NEWS_WINDOW_DAYS);

        let articles: Vec<NewsWire> = self
            .get_json(
                "company-news",
                &[
                    ("symbol", symbol.as_str()),
                    ("from", &from.format("%Y-%m-%d").to_string()),
                    ("to", &to.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;

        let items: Vec<NewsItem> = articles
            .into_iter()
            .filter_map(|a| {
                let title = a.headline.filter(|h| !h.trim().is_empty())?;
                Some(NewsItem {
                    title,
                    publisher: a.source,
                    url: a.url,
                    published_at: a.datetime.and_then(|t| DateTime::from_timestamp(t, 0)),
                })
            })
            .take(limit)
            .collect();

        debug!(symbol = %symbol, count = items.len(), "finnhub news fetched");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_missing_key_is_a_credential_error() {
        let client = FinnhubClient::new(None, 60, StdDuration::from_secs(5));
        assert!(matches!(
            client.key(),
            Err(SourceError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let client = FinnhubClient::new(Some("   ".to_string()), 60, StdDuration::from_secs(5));
        assert!(client.key().is_err());
    }

    #[test]
    fn test_quote_wire_parses_partial_payload() {
        let wire: QuoteWire = serde_json::from_str(r#"{"c": 187.3, "dp": 1.2}"#).unwrap();
        assert_eq!(wire.c, Some(187.3));
        assert_eq!(wire.pc, None);
        assert_eq!(wire.t, None);
    }
}
