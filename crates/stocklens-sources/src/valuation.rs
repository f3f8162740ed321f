//! Valuation ratios from the Yahoo key-statistics page
//!
//! The page embeds its quoteSummary state as JSON inside
//! `<script type="application/json">` bodies. We scan for those blobs and
//! pull the statistics modules out of whichever one carries them, falling
//! back to the quoteSummary API when the page layout changes. Breakage is
//! never fatal; the resolver records a warning and leaves the fields
//! missing.

use crate::error::{Result, SourceError};
use crate::feeds::{ValuationData, ValuationFeed};
use crate::yahoo::{first_summary_result, jnum, quote_summary, BROWSER_UA};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration as StdDuration;
use stocklens_core::Symbol;
use tracing::{debug, instrument};

const PAGE_URL: &str = "https://finance.yahoo.com/quote";

const SCRIPT_OPEN: &str = "<script type=\"application/json\"";
const SCRIPT_CLOSE: &str = "</script>";

/// Yahoo valuation client, page parse first, API fallback second.
pub struct YahooValuationClient {
    client: Client,
}

impl YahooValuationClient {
    pub fn new(timeout: StdDuration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch_page(&self, symbol: &Symbol) -> Result<String> {
        let url = format!("{PAGE_URL}/{}/key-statistics", symbol.as_str());
        let response = self
            .client
            .get(&url)
            .header("User-Agent", BROWSER_UA)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("key-statistics page for {}", symbol.as_str()),
            });
        }
        Ok(response.text().await?)
    }

    async fn from_api(&self, symbol: &Symbol) -> Result<ValuationData> {
        let result = quote_summary(
            &self.client,
            symbol,
            "summaryDetail,defaultKeyStatistics",
        )
        .await?;
        Ok(extract_ratios(&result))
    }
}

#[async_trait]
impl ValuationFeed for YahooValuationClient {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn valuation(&self, symbol: &Symbol) -> Result<ValuationData> {
        match self.fetch_page(symbol).await {
            Ok(html) => {
                if let Some(data) = parse_embedded(&html) {
                    return Ok(data);
                }
                debug!(symbol = %symbol, "no usable embedded blob, trying API");
                self.from_api(symbol).await
            }
            Err(err) => {
                debug!(symbol = %symbol, error = %err, "page fetch failed, trying API");
                self.from_api(symbol).await
            }
        }
    }
}

/// Scan the page for JSON script bodies and pull ratios from the first blob
/// that carries a statistics module.
fn parse_embedded(html: &str) -> Option<ValuationData> {
    for blob in script_bodies(html) {
        let Ok(value) = serde_json::from_str::<Value>(blob) else {
            continue;
        };
        // Some blobs wrap the summary envelope, others embed modules deeper.
        let result = first_summary_result(&value)
            .or_else(|| find_object_with(&value, "defaultKeyStatistics"))
            .or_else(|| find_object_with(&value, "summaryDetail"));
        if let Some(result) = result {
            let ratios = extract_ratios(&result);
            if ratios != ValuationData::default() {
                return Some(ratios);
            }
        }
    }
    None
}

/// Iterate the bodies of `<script type="application/json">` tags.
fn script_bodies(html: &str) -> impl Iterator<Item = &str> {
    html.split(SCRIPT_OPEN).skip(1).filter_map(|chunk| {
        let start = chunk.find('>')? + 1;
        let end = chunk.find(SCRIPT_CLOSE)?;
        if start < end { Some(&chunk[start..end]) } else { None }
    })
}

/// Depth-first search for the nearest object containing `key`.
fn find_object_with(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if map.contains_key(key) {
                return Some(value.clone());
            }
            map.values().find_map(|v| find_object_with(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_object_with(v, key)),
        _ => None,
    }
}

fn extract_ratios(result: &Value) -> ValuationData {
    ValuationData {
        forward_pe: jnum(result, &["defaultKeyStatistics", "forwardPE"])
            .or_else(|| jnum(result, &["summaryDetail", "forwardPE"])),
        peg: jnum(result, &["defaultKeyStatistics", "pegRatio"])
            .or_else(|| jnum(result, &["defaultKeyStatistics", "trailingPegRatio"])),
        ev_to_ebitda: jnum(result, &["defaultKeyStatistics", "enterpriseToEbitda"]),
        price_to_sales: jnum(result, &["summaryDetail", "priceToSalesTrailing12Months"]),
        price_to_book: jnum(result, &["defaultKeyStatistics", "priceToBook"]),
    }
}
