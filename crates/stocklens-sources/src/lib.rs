//! External data-source clients for stocklens
//!
//! One client per upstream service, each behind a role trait from
//! [`feeds`] so the aggregation engine depends on seams, not vendors:
//!
//! - [`finnhub::FinnhubClient`] - primary quotes and company news
//! - [`yahoo::YahooClient`] - chart history, quote fallback, statements,
//!   analyst estimates
//! - [`valuation::YahooValuationClient`] - valuation ratios via page parse
//! - [`news::YahooNewsClient`] - news fallback
//! - [`search::ExaClient`] / [`search::TavilyClient`] - external web search

pub mod error;
pub mod feeds;
pub mod finnhub;
pub mod news;
pub mod search;
pub mod valuation;
pub mod yahoo;

// Re-export main types for convenience
pub use error::{Result, SourceError};
pub use feeds::{
    ChartBar, ChartFeed, ChartSeries, EstimatesData, EstimatesFeed, FinancialsData,
    FinancialsFeed, NewsFeed, QuoteData, QuoteFeed, SearchFeed, SearchItem, ValuationData,
    ValuationFeed,
};
pub use finnhub::FinnhubClient;
pub use news::YahooNewsClient;
pub use search::{ExaClient, TavilyClient};
pub use valuation::YahooValuationClient;
pub use yahoo::YahooClient;
