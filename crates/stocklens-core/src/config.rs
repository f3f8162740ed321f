//! Runtime configuration for the aggregation engine and AI orchestrator

use crate::error::{LensError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding the financial-data cache TTL (hours).
pub const ENV_FIN_CACHE_TTL_HOURS: &str = "STOCKLENS_FIN_CACHE_TTL_HOURS";

/// Environment variable overriding the AI continuation round cap.
pub const ENV_AI_MAX_CONTINUE_ROUNDS: &str = "STOCKLENS_AI_MAX_CONTINUE_ROUNDS";

/// Configuration shared across the engine and AI crates.
///
/// Values come from defaults, builder overrides, then `from_env` overrides,
/// in that order. Out-of-range env values fall back to the default rather
/// than aborting startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensConfig {
    /// TTL for cached financial statements and forecasts
    pub fin_cache_ttl: Duration,

    /// External-search items kept per symbol (clamped 1..=20)
    pub max_search_items: usize,

    /// News items kept per symbol (clamped 1..=20)
    pub news_items: usize,

    /// Maximum AI continuation rounds after a truncated response (min 1)
    pub max_continuation_rounds: u32,

    /// max_tokens sent to the Claude API
    pub claude_max_tokens: u32,

    /// Concurrent per-symbol resolutions in a comparison request
    pub worker_cap: usize,

    /// Timeout applied to one symbol's full resolution
    pub symbol_timeout: Duration,

    /// HTTP timeout for data-source requests
    pub source_timeout: Duration,

    /// HTTP timeout for AI provider requests
    pub ai_timeout: Duration,

    /// Default model for OpenAI-compatible endpoints
    pub openai_model: String,

    /// Default Gemini model
    pub gemini_model: String,

    /// Default Claude model
    pub claude_model: String,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            fin_cache_ttl: Duration::from_secs(12 * 3600), // 12 hours
            max_search_items: 10,
            news_items: 10,
            max_continuation_rounds: 8,
            claude_max_tokens: 8192,
            worker_cap: 8,
            symbol_timeout: Duration::from_secs(45),
            source_timeout: Duration::from_secs(20),
            ai_timeout: Duration::from_secs(120),
            openai_model: "gpt-4o-mini".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            claude_model: "claude-sonnet-4-20250514".to_string(),
        }
    }
}

impl LensConfig {
    /// Create a new configuration builder.
    pub fn builder() -> LensConfigBuilder {
        LensConfigBuilder::default()
    }

    /// Apply environment overrides on top of the current values.
    pub fn from_env(mut self) -> Self {
        if let Some(hours) = env_parse::<u64>(ENV_FIN_CACHE_TTL_HOURS) {
            if hours > 0 {
                self.fin_cache_ttl = Duration::from_secs(hours * 3600);
            }
        }
        if let Some(rounds) = env_parse::<u32>(ENV_AI_MAX_CONTINUE_ROUNDS) {
            self.max_continuation_rounds = rounds.max(1);
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.fin_cache_ttl.is_zero() {
            return Err(LensError::ConfigError(
                "fin_cache_ttl must be non-zero".to_string(),
            ));
        }
        if self.worker_cap == 0 {
            return Err(LensError::ConfigError(
                "worker_cap must be greater than 0".to_string(),
            ));
        }
        if self.max_continuation_rounds == 0 {
            return Err(LensError::ConfigError(
                "max_continuation_rounds must be at least 1".to_string(),
            ));
        }
        if !(1..=20).contains(&self.max_search_items) {
            return Err(LensError::ConfigError(
                "max_search_items must be within 1..=20".to_string(),
            ));
        }
        if !(1..=20).contains(&self.news_items) {
            return Err(LensError::ConfigError(
                "news_items must be within 1..=20".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// Builder for [`LensConfig`].
#[derive(Debug, Default)]
pub struct LensConfigBuilder {
    fin_cache_ttl: Option<Duration>,
    max_search_items: Option<usize>,
    news_items: Option<usize>,
    max_continuation_rounds: Option<u32>,
    claude_max_tokens: Option<u32>,
    worker_cap: Option<usize>,
    symbol_timeout: Option<Duration>,
    source_timeout: Option<Duration>,
    ai_timeout: Option<Duration>,
    openai_model: Option<String>,
    gemini_model: Option<String>,
    claude_model: Option<String>,
}

impl LensConfigBuilder {
    /// Set the financial cache TTL.
    pub fn fin_cache_ttl(mut self, ttl: Duration) -> Self {
        self.fin_cache_ttl = Some(ttl);
        self
    }

    /// Set the per-symbol external-search item cap.
    pub fn max_search_items(mut self, items: usize) -> Self {
        self.max_search_items = Some(items.clamp(1, 20));
        self
    }

    /// Set the per-symbol news item cap.
    pub fn news_items(mut self, items: usize) -> Self {
        self.news_items = Some(items.clamp(1, 20));
        self
    }

    /// Set the continuation round cap.
    pub fn max_continuation_rounds(mut self, rounds: u32) -> Self {
        self.max_continuation_rounds = Some(rounds.max(1));
        self
    }

    /// Set max_tokens for the Claude API.
    pub fn claude_max_tokens(mut self, tokens: u32) -> Self {
        self.claude_max_tokens = Some(tokens);
        self
    }

    /// Set the fan-out concurrency cap.
    pub fn worker_cap(mut self, cap: usize) -> Self {
        self.worker_cap = Some(cap);
        self
    }

    /// Set the per-symbol resolution timeout.
    pub fn symbol_timeout(mut self, timeout: Duration) -> Self {
        self.symbol_timeout = Some(timeout);
        self
    }

    /// Set the data-source HTTP timeout.
    pub fn source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = Some(timeout);
        self
    }

    /// Set the AI provider HTTP timeout.
    pub fn ai_timeout(mut self, timeout: Duration) -> Self {
        self.ai_timeout = Some(timeout);
        self
    }

    /// Set the default OpenAI-compatible model.
    pub fn openai_model(mut self, model: impl Into<String>) -> Self {
        self.openai_model = Some(model.into());
        self
    }

    /// Set the default Gemini model.
    pub fn gemini_model(mut self, model: impl Into<String>) -> Self {
        self.gemini_model = Some(model.into());
        self
    }

    /// Set the default Claude model.
    pub fn claude_model(mut self, model: impl Into<String>) -> Self {
        self.claude_model = Some(model.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<LensConfig> {
        let defaults = LensConfig::default();

        let config = LensConfig {
            fin_cache_ttl: self.fin_cache_ttl.unwrap_or(defaults.fin_cache_ttl),
            max_search_items: self.max_search_items.unwrap_or(defaults.max_search_items),
            news_items: self.news_items.unwrap_or(defaults.news_items),
            max_continuation_rounds: self
                .max_continuation_rounds
                .unwrap_or(defaults.max_continuation_rounds),
            claude_max_tokens: self.claude_max_tokens.unwrap_or(defaults.claude_max_tokens),
            worker_cap: self.worker_cap.unwrap_or(defaults.worker_cap),
            symbol_timeout: self.symbol_timeout.unwrap_or(defaults.symbol_timeout),
            source_timeout: self.source_timeout.unwrap_or(defaults.source_timeout),
            ai_timeout: self.ai_timeout.unwrap_or(defaults.ai_timeout),
            openai_model: self.openai_model.unwrap_or(defaults.openai_model),
            gemini_model: self.gemini_model.unwrap_or(defaults.gemini_model),
            claude_model: self.claude_model.unwrap_or(defaults.claude_model),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LensConfig::default();
        assert_eq!(config.fin_cache_ttl, Duration::from_secs(12 * 3600));
        assert_eq!(config.worker_cap, 8);
        assert_eq!(config.max_continuation_rounds, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = LensConfig::builder()
            .fin_cache_ttl(Duration::from_secs(3600))
            .worker_cap(4)
            .gemini_model("gemini-2.5-pro")
            .build()
            .unwrap();

        assert_eq!(config.fin_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.worker_cap, 4);
        assert_eq!(config.gemini_model, "gemini-2.5-pro");
    }

    #[test]
    fn test_builder_clamps_item_caps() {
        let config = LensConfig::builder()
            .max_search_items(99)
            .news_items(0)
            .build()
            .unwrap();

        assert_eq!(config.max_search_items, 20);
        assert_eq!(config.news_items, 1);
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let config = LensConfig {
            worker_cap: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        unsafe {
            std::env::set_var(ENV_FIN_CACHE_TTL_HOURS, "24");
            std::env::set_var(ENV_AI_MAX_CONTINUE_ROUNDS, "0");
        }

        let config = LensConfig::default().from_env();
        assert_eq!(config.fin_cache_ttl, Duration::from_secs(24 * 3600));
        // rounds floor at 1
        assert_eq!(config.max_continuation_rounds, 1);

        unsafe {
            std::env::remove_var(ENV_FIN_CACHE_TTL_HOURS);
            std::env::remove_var(ENV_AI_MAX_CONTINUE_ROUNDS);
        }
    }
}
