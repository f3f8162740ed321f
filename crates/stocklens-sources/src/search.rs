//! Exa and Tavily web-search clients

use crate::error::{Result, SourceError};
use crate::feeds::{compact_text, SearchFeed, SearchItem, MAX_SNIPPET_LEN, MAX_TITLE_LEN};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration as StdDuration;
use tracing::{debug, instrument};
use url::Url;

const EXA_URL: &str = "https://api.exa.ai/search";
const TAVILY_URL: &str = "https://api.tavily.com/search";

/// Per-call result ceiling, independent of the caller's limit.
const MAX_RESULTS_PER_CALL: usize = 10;

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_string())
}

fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

// ===== Exa =====

#[derive(Debug, Deserialize)]
struct ExaResponseWire {
    #[serde(default)]
    results: Vec<ExaResultWire>,
}

#[derive(Debug, Deserialize)]
struct ExaResultWire {
    title: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
    text: Option<String>,
}

/// Exa search client.
pub struct ExaClient {
    client: Client,
    api_key: Option<String>,
}

impl ExaClient {
    pub fn new(api_key: Option<String>, timeout: StdDuration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SourceError::MissingCredential("EXA_API_KEY".to_string()))
    }

    /// Validate a configured key with a one-result probe search.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<()> {
        self.search("stock market", 1, 1).await.map(|_| ())
    }
}

#[async_trait]
impl SearchFeed for ExaClient {
    fn provider(&self) -> &'static str {
        "exa"
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        lookback_days: u32,
        limit: usize,
    ) -> Result<Vec<SearchItem>> {
        let key = self.key()?;
        let start = (Utc::now() - Duration::days(i64::from(lookback_days)))
            .format("%Y-%m-%d")
            .to_string();

        let body = json!({
            "query": query,
            "type": "auto",
            "numResults": limit.min(MAX_RESULTS_PER_CALL),
            "startPublishedDate": start,
            "contents": {"text": {"maxCharacters": 600}}
        });

        let response = self
            .client
            .post(EXA_URL)
            .header("x-api-key", key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("Exa search: {text}"),
            });
        }

        let wire: ExaResponseWire = response.json().await?;
        let items: Vec<SearchItem> = wire
            .results
            .into_iter()
            .filter_map(|r| {
                let title = r.title.filter(|t| !t.trim().is_empty())?;
                let url = r.url.filter(|u| !u.trim().is_empty())?;
                Some(SearchItem {
                    provider: "exa".to_string(),
                    title: compact_text(&title, MAX_TITLE_LEN),
                    source: host_of(&url),
                    url,
                    published_at: r.published_date.as_deref().and_then(parse_published),
                    snippet: r
                        .text
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| compact_text(&t, MAX_SNIPPET_LEN)),
                })
            })
            .take(limit.min(MAX_RESULTS_PER_CALL))
            .collect();

        debug!(count = items.len(), "exa search done");
        Ok(items)
    }
}

// ===== Tavily =====

#[derive(Debug, Deserialize)]
struct TavilyResponseWire {
    #[serde(default)]
    results: Vec<TavilyResultWire>,
}

#[derive(Debug, Deserialize)]
struct TavilyResultWire {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
    #[serde(rename = "published_date")]
    published_date: Option<String>,
}

/// Tavily search client.
pub struct TavilyClient {
    client: Client,
    api_key: Option<String>,
}

impl TavilyClient {
    pub fn new(api_key: Option<String>, timeout: StdDuration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SourceError::MissingCredential("TAVILY_API_KEY".to_string()))
    }

    /// Validate a configured key with a one-result probe search.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<()> {
        self.search("stock market", 1, 1).await.map(|_| ())
    }
}

#[async_trait]
impl SearchFeed for TavilyClient {
    fn provider(&self) -> &'static str {
        "tavily"
    }

    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        lookback_days: u32,
        limit: usize,
    ) -> Result<Vec<SearchItem>> {
        let key = self.key()?;
        let body = json!({
            "query": query,
            "topic": "news",
            "search_depth": "basic",
            "days": lookback_days,
            "max_results": limit.min(MAX_RESULTS_PER_CALL)
        });

        let response = self
            .client
            .post(TAVILY_URL)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: format!("Tavily search: {text}"),
            });
        }

        // Tavily's `days` filter is advisory; enforce the cutoff on dated
        // results and keep undated ones.
        let cutoff = Utc::now() - Duration::days(i64::from(lookback_days));

        let wire: TavilyResponseWire = response.json().await?;
        let items: Vec<SearchItem> = wire
            .results
            .into_iter()
            .filter_map(|r| {
                let title = r.title.filter(|t| !t.trim().is_empty())?;
                let url = r.url.filter(|u| !u.trim().is_empty())?;
                let published_at = r.published_date.as_deref().and_then(parse_published);
                if published_at.is_some_and(|d| d < cutoff) {
                    return None;
                }
                Some(SearchItem {
                    provider: "tavily".to_string(),
                    title: compact_text(&title, MAX_TITLE_LEN),
                    source: host_of(&url),
                    url,
                    published_at,
                    snippet: r
                        .content
                        .filter(|c| !c.trim().is_empty())
                        .map(|c| compact_text(&c, MAX_SNIPPET_LEN)),
                })
            })
            .take(limit.min(MAX_RESULTS_PER_CALL))
            .collect();

        debug!(count = items.len(), "tavily search done");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of_strips_www() {
        assert_eq!(
            host_of("https://www.reuters.com/markets/a"),
            Some("reuters.com".to_string())
        );
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn test_parse_published_formats() {
        assert!(parse_published("2025-08-20T14:30:00Z").is_some());
        assert!(parse_published("2025-08-20").is_some());
        assert!(parse_published("last Tuesday").is_none());
    }

    #[test]
    fn test_missing_keys_are_credential_errors() {
        let exa = ExaClient::new(None, StdDuration::from_secs(5));
        assert!(matches!(exa.key(), Err(SourceError::MissingCredential(_))));

        let tavily = TavilyClient::new(Some(String::new()), StdDuration::from_secs(5));
        assert!(matches!(
            tavily.key(),
            Err(SourceError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_exa_wire_tolerates_sparse_results() {
        let wire: ExaResponseWire = serde_json::from_str(
            r#"{"results": [
                {"title": "Story", "url": "https://a.example/x",
                 "publishedDate": "2025-08-20T00:00:00Z", "text": "body"},
                {"url": "https://no-title.example"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(wire.results.len(), 2);
        assert!(wire.results[1].title.is_none());
    }
}
