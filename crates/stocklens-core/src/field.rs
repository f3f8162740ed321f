//! Metric fields with explicit provenance
//!
//! Every resolved metric records which source actually supplied it. A field
//! is either a concrete value with provenance or absent entirely
//! (`Option::None`) - the resolver never fabricates defaults.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which external source supplied a resolved field's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Finnhub REST API (primary quote/news provider)
    Finnhub,
    /// Yahoo Finance quoteSummary / chart API (fallback quotes, financials, estimates)
    Yahoo,
    /// Yahoo Finance page scrape (valuation ratios)
    YahooPage,
    /// Computed locally from a historical close series
    DerivedChart,
    /// Finnhub company-news feed
    FinnhubNews,
    /// Yahoo Finance news feed (fallback)
    YahooNews,
    /// Exa web search
    Exa,
    /// Tavily web search
    Tavily,
}

impl Provenance {
    /// Stable lowercase identifier used in warnings and serialized output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Finnhub => "finnhub",
            Self::Yahoo => "yahoo",
            Self::YahooPage => "yahoo_page",
            Self::DerivedChart => "derived_chart",
            Self::FinnhubNews => "finnhub_news",
            Self::YahooNews => "yahoo_news",
            Self::Exa => "exa",
            Self::Tavily => "tavily",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single resolved metric: value plus the source that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricField<T> {
    /// The resolved value
    pub value: T,
    /// Source that actually returned this value
    pub source: Provenance,
}

impl<T> MetricField<T> {
    /// Tag a value with its provenance.
    pub fn new(value: T, source: Provenance) -> Self {
        Self { value, source }
    }

    /// Map the inner value, keeping provenance.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MetricField<U> {
        MetricField {
            value: f(self.value),
            source: self.source,
        }
    }
}

impl<T: Copy> MetricField<T> {
    /// The inner value by copy.
    pub fn get(&self) -> T {
        self.value
    }
}

/// First non-missing field in priority order.
///
/// This is the uniform primitive behind every fallback chain: callers list
/// candidates from highest to lowest priority and the first concrete value
/// wins, keeping its own provenance.
pub fn first_resolved<T>(candidates: impl IntoIterator<Item = Option<MetricField<T>>>) -> Option<MetricField<T>> {
    candidates.into_iter().flatten().next()
}

/// Convenience for tagging an optional numeric value.
pub fn tag_opt<T>(value: Option<T>, source: Provenance) -> Option<MetricField<T>> {
    value.map(|v| MetricField::new(v, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_resolved_respects_priority() {
        let primary = Some(MetricField::new(10.0, Provenance::Finnhub));
        let fallback = Some(MetricField::new(11.0, Provenance::Yahoo));
        let picked = first_resolved([primary, fallback]).unwrap();
        assert_eq!(picked.value, 10.0);
        assert_eq!(picked.source, Provenance::Finnhub);
    }

    #[test]
    fn test_first_resolved_falls_through_missing() {
        let picked = first_resolved([None, Some(MetricField::new(2.5, Provenance::Yahoo))]).unwrap();
        assert_eq!(picked.source, Provenance::Yahoo);
    }

    #[test]
    fn test_first_resolved_all_missing() {
        let picked: Option<MetricField<f64>> = first_resolved([None, None]);
        assert!(picked.is_none());
    }

    #[test]
    fn test_provenance_labels() {
        assert_eq!(Provenance::Finnhub.to_string(), "finnhub");
        assert_eq!(Provenance::DerivedChart.as_str(), "derived_chart");
    }
}
