//! Yahoo Finance news fallback feed

use crate::error::{Result, SourceError};
use crate::feeds::NewsFeed;
use crate::yahoo::BROWSER_UA;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use stocklens_core::{NewsItem, Symbol};
use tracing::{debug, instrument};

const SEARCH_URL: &str = "https://query1.finance.yahoo.com/v1/finance/search";

#[derive(Debug, Deserialize)]
struct SearchWire {
    #[serde(default)]
    news: Vec<NewsEntryWire>,
}

#[derive(Debug, Deserialize)]
struct NewsEntryWire {
    title: Option<String>,
    publisher: Option<String>,
    link: Option<String>,
    /// Publish time (UNIX seconds)
    #[serde(rename = "providerPublishTime")]
    provider_publish_time: Option<i64>,
}

/// News fallback when the primary feed fails or returns nothing.
pub struct YahooNewsClient {
    client: Client,
}

impl YahooNewsClient {
    pub fn new(timeout: StdDuration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl NewsFeed for YahooNewsClient {
    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn news(&self, symbol: &Symbol, limit: usize) -> Result<Vec<NewsItem>> {
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("q", symbol.as_str()),
                ("newsCount", &limit.to_string()),
                ("quotesCount", "0"),
            ])
            .header("User-Agent", BROWSER_UA)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("news search for {}", symbol.as_str()),
            });
        }

        let wire: SearchWire = response.json().await?;
        let items: Vec<NewsItem> = wire
            .news
            .into_iter()
            .filter_map(|n| {
                let title = n.title.filter(|t| !t.trim().is_empty())?;
                Some(NewsItem {
                    title,
                    publisher: n.publisher,
                    url: n.link,
                    published_at: n
                        .provider_publish_time
                        .and_then(|t| DateTime::from_timestamp(t, 0)),
                })
            })
            .take(limit)
            .collect();

        debug!(symbol = %symbol, count = items.len(), "yahoo news fetched");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_skips_untitled_entries() {
        let wire: SearchWire = serde_json::from_str(
            r#"{"news": [
                {"title": "NVIDIA beats estimates", "publisher": "Reuters",
                 "link": "https://example.com/1", "providerPublishTime": 1724652000},
                {"publisher": "No Title Wire"},
                {"title": "   "}
            ]}"#,
        )
        .unwrap();

        let items: Vec<NewsItem> = wire
            .news
            .into_iter()
            .filter_map(|n| {
                let title = n.title.filter(|t| !t.trim().is_empty())?;
                Some(NewsItem {
                    title,
                    publisher: n.publisher,
                    url: n.link,
                    published_at: n
                        .provider_publish_time
                        .and_then(|t| DateTime::from_timestamp(t, 0)),
                })
            })
            .collect();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].publisher.as_deref(), Some("Reuters"));
        assert!(items[0].published_at.is_some());
    }

    #[test]
    fn test_wire_tolerates_missing_news_array() {
        let wire: SearchWire = serde_json::from_str("{}").unwrap();
        assert!(wire.news.is_empty());
    }
}
