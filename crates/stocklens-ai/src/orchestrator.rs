//! Analysis orchestration: dispatch, retry, and the continuation loop

use crate::error::{AiError, Result};
use crate::prompt::{self, AnalysisKind};
use crate::provider::AiProvider;
use crate::request::{ProviderRequest, ProviderResponse};
use crate::transcript::{normalize_transcript, ChatTurn};
use std::sync::Arc;
use stocklens_core::snapshot::SecuritySnapshot;
use stocklens_core::Symbol;
use stocklens_sources::feeds::dedupe_search_items;
use stocklens_sources::{SearchFeed, SearchItem};
use tracing::{debug, instrument, warn};

/// Instruction sent when a response was cut off mid-answer.
const CONTINUE_INSTRUCTION: &str =
    "Your previous answer was cut off. Continue exactly where you stopped, \
     without repeating anything you already wrote.";

/// How a finished analysis ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishState {
    /// The model completed its answer
    Complete,
    /// The continuation cap was hit; the text is best-effort
    TruncatedAtCap,
}

/// Result of one analysis or follow-up run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub text: String,
    pub provider: &'static str,
    pub model: String,
    pub finish: FinishState,
}

/// Search query framing for external context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Recent headlines and events
    News,
    /// Earnings and financial results
    Financial,
}

impl SearchMode {
    fn query(self, symbol: &Symbol) -> String {
        match self {
            Self::News => format!("{symbol} stock latest news"),
            Self::Financial => format!("{symbol} quarterly earnings financial results"),
        }
    }
}

/// Drives one provider through prompt building, bounded retry, and the
/// continuation loop for truncated answers.
pub struct AnalysisOrchestrator {
    provider: Arc<dyn AiProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_continuation_rounds: u32,
}

impl AnalysisOrchestrator {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        model: impl Into<String>,
        max_continuation_rounds: u32,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: Some(0.4),
            max_tokens: None,
            max_continuation_rounds: max_continuation_rounds.max(1),
        }
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override max_tokens per provider call.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Run a fresh analysis over the snapshot set.
    ///
    /// When `search_context` is present the provider's native search
    /// grounding stays off; the context already covers it.
    #[instrument(skip(self, snapshots, search_context), fields(kind = kind.label(), model = %self.model))]
    pub async fn analyze(
        &self,
        kind: AnalysisKind,
        snapshots: &[SecuritySnapshot],
        search_context: Option<&str>,
        enable_native_search: bool,
    ) -> Result<AnalysisOutcome> {
        if snapshots.is_empty() {
            return Err(AiError::InvalidRequest(
                "analysis requires at least one snapshot".to_string(),
            ));
        }

        let turns = vec![ChatTurn::user(prompt::build_analysis_prompt(
            kind,
            snapshots,
            search_context,
        ))];
        let enable_search = enable_native_search && search_context.is_none();
        self.run(turns, enable_search).await
    }

    /// Answer a follow-up question in the context of a prior analysis.
    ///
    /// An empty transcript with a present base analysis is fine; an empty
    /// question or an empty snapshot set is not.
    #[instrument(skip_all, fields(kind = kind.label(), model = %self.model))]
    pub async fn follow_up(
        &self,
        kind: AnalysisKind,
        base_analysis: Option<&str>,
        transcript: Vec<ChatTurn>,
        question: &str,
        snapshots: &[SecuritySnapshot],
    ) -> Result<AnalysisOutcome> {
        if question.trim().is_empty() {
            return Err(AiError::InvalidRequest(
                "follow-up question is empty".to_string(),
            ));
        }
        if snapshots.is_empty() {
            return Err(AiError::InvalidRequest(
                "follow-up requires snapshot context".to_string(),
            ));
        }

        let transcript = normalize_transcript(transcript);
        let turns =
            prompt::build_follow_up_turns(kind, base_analysis, &transcript, question, snapshots);
        self.run(turns, false).await
    }

    /// The continuation loop: keep asking for the rest of a truncated
    /// answer until it completes or the round cap is reached.
    async fn run(&self, mut turns: Vec<ChatTurn>, enable_search: bool) -> Result<AnalysisOutcome> {
        let mut combined = String::new();
        let mut rounds = 0_u32;

        let finish = loop {
            let request = ProviderRequest {
                model: self.model.clone(),
                system: Some(prompt::system_prompt()),
                turns: turns.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                enable_search,
            };

            let response = self.send_with_retry(&request).await?;
            combined.push_str(&response.text);

            if !response.finish.is_truncated() {
                break FinishState::Complete;
            }
            rounds += 1;
            if rounds >= self.max_continuation_rounds {
                warn!(rounds, "continuation cap reached, returning partial text");
                break FinishState::TruncatedAtCap;
            }
            debug!(rounds, "response truncated, continuing");
            turns.push(ChatTurn::assistant(response.text));
            turns.push(ChatTurn::user(CONTINUE_INSTRUCTION));
        };

        if combined.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }

        Ok(AnalysisOutcome {
            text: combined,
            provider: self.provider.name(),
            model: self.model.clone(),
            finish,
        })
    }

    /// One bounded retry for transient failures; configuration errors and
    /// rate limits surface immediately.
    async fn send_with_retry(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        match self.provider.send(request).await {
            Ok(response) => Ok(response),
            Err(err @ (AiError::RequestFailed(_) | AiError::HttpError(_))) => {
                warn!(error = %err, "transient provider failure, retrying once");
                self.provider.send(request).await
            }
            Err(err) => Err(err),
        }
    }
}

/// Collect per-symbol web context: the first feed fills as much of the
/// per-symbol cap as it can, later feeds top up the remainder. Feed
/// failures degrade to fewer items, never to an error.
#[instrument(skip(feeds, symbols))]
pub async fn gather_search_context(
    feeds: &[&dyn SearchFeed],
    symbols: &[Symbol],
    mode: SearchMode,
    per_symbol_cap: usize,
    lookback_days: u32,
) -> Vec<(String, Vec<SearchItem>)> {
    let mut groups = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let query = mode.query(symbol);
        let mut items: Vec<SearchItem> = Vec::new();

        for feed in feeds {
            if items.len() >= per_symbol_cap {
                break;
            }
            let remaining = per_symbol_cap - items.len();
            match feed.search(&query, lookback_days, remaining).await {
                Ok(found) => items.extend(found),
                Err(err) => {
                    debug!(provider = feed.provider(), symbol = %symbol, error = %err,
                        "search feed failed");
                }
            }
            items = dedupe_search_items(items);
        }

        items.truncate(per_symbol_cap);
        groups.push((symbol.to_string(), items));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::FinishReason;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use stocklens_core::{MetricField, Provenance};

    /// Provider double that replays a script and records every request.
    struct ScriptedProvider {
        script: Mutex<Vec<Result<ProviderResponse>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<ProviderResponse>>) -> Self {
            Self {
                script: Mutex::new(script),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn response(text: &str, finish: FinishReason) -> ProviderResponse {
            ProviderResponse {
                text: text.to_string(),
                finish,
                raw: None,
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn send(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.script.lock().unwrap().remove(0)
        }
    }

    fn snapshots() -> Vec<SecuritySnapshot> {
        let mut snapshot =
            SecuritySnapshot::empty(stocklens_core::Symbol::parse("NVDA").unwrap());
        snapshot.realtime.price = Some(MetricField::new(187.32, Provenance::Finnhub));
        vec![snapshot]
    }

    #[tokio::test]
    async fn test_complete_response_is_single_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ScriptedProvider::response(
            "full answer",
            FinishReason::Complete,
        ))]));
        let orchestrator = AnalysisOrchestrator::new(provider.clone(), "model-x", 8);

        let outcome = orchestrator
            .analyze(AnalysisKind::FinancialAnalysis, &snapshots(), None, false)
            .await
            .unwrap();

        assert_eq!(outcome.text, "full answer");
        assert_eq!(outcome.finish, FinishState::Complete);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_continuation_concatenates_rounds() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ScriptedProvider::response("part one, ", FinishReason::Truncated)),
            Ok(ScriptedProvider::response("part two, ", FinishReason::Truncated)),
            Ok(ScriptedProvider::response("the end.", FinishReason::Complete)),
        ]));
        let orchestrator = AnalysisOrchestrator::new(provider.clone(), "model-x", 8);

        let outcome = orchestrator
            .analyze(AnalysisKind::FinancialAnalysis, &snapshots(), None, false)
            .await
            .unwrap();

        assert_eq!(outcome.text, "part one, part two, the end.");
        assert_eq!(outcome.finish, FinishState::Complete);
        // two truncated rounds mean exactly three calls
        assert_eq!(provider.calls(), 3);

        // the second request replays the partial text as an assistant turn
        let requests = provider.requests.lock().unwrap();
        let second = &requests[1];
        assert_eq!(second.turns.len(), 3);
        assert_eq!(second.turns[1].text, "part one, ");
        assert!(second.turns[2].text.contains("Continue exactly"));
    }

    #[tokio::test]
    async fn test_continuation_cap_flags_truncation() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ScriptedProvider::response("a", FinishReason::Truncated)),
            Ok(ScriptedProvider::response("b", FinishReason::Truncated)),
        ]));
        let orchestrator = AnalysisOrchestrator::new(provider.clone(), "model-x", 2);

        let outcome = orchestrator
            .analyze(AnalysisKind::FinancialAnalysis, &snapshots(), None, false)
            .await
            .unwrap();

        assert_eq!(outcome.text, "ab");
        assert_eq!(outcome.finish, FinishState::TruncatedAtCap);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_final_text_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ScriptedProvider::response(
            "   ",
            FinishReason::Complete,
        ))]));
        let orchestrator = AnalysisOrchestrator::new(provider, "model-x", 8);

        let result = orchestrator
            .analyze(AnalysisKind::FinancialAnalysis, &snapshots(), None, false)
            .await;
        assert!(matches!(result, Err(AiError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_transient_failure_retries_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(AiError::RequestFailed("503".to_string())),
            Ok(ScriptedProvider::response("recovered", FinishReason::Complete)),
        ]));
        let orchestrator = AnalysisOrchestrator::new(provider.clone(), "model-x", 8);

        let outcome = orchestrator
            .analyze(AnalysisKind::FinancialAnalysis, &snapshots(), None, false)
            .await
            .unwrap();
        assert_eq!(outcome.text, "recovered");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_config_error_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            AiError::AuthenticationFailed,
        )]));
        let orchestrator = AnalysisOrchestrator::new(provider.clone(), "model-x", 8);

        let result = orchestrator
            .analyze(AnalysisKind::FinancialAnalysis, &snapshots(), None, false)
            .await;
        assert!(matches!(result, Err(AiError::AuthenticationFailed)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_native_search_disabled_when_context_present() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ScriptedProvider::response(
            "ok",
            FinishReason::Complete,
        ))]));
        let orchestrator = AnalysisOrchestrator::new(provider.clone(), "model-x", 8);

        orchestrator
            .analyze(
                AnalysisKind::FinancialAnalysis,
                &snapshots(),
                Some("[NVDA]\n- headline"),
                true,
            )
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        assert!(!requests[0].enable_search);
    }

    #[tokio::test]
    async fn test_follow_up_with_empty_transcript_and_base_analysis() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ScriptedProvider::response(
            "follow-up answer",
            FinishReason::Complete,
        ))]));
        let orchestrator = AnalysisOrchestrator::new(provider.clone(), "model-x", 8);

        let outcome = orchestrator
            .follow_up(
                AnalysisKind::FinancialAnalysis,
                Some("prior analysis"),
                Vec::new(),
                "What about cash flow?",
                &snapshots(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.text, "follow-up answer");

        let requests = provider.requests.lock().unwrap();
        // opening context, base analysis, question
        assert_eq!(requests[0].turns.len(), 3);
    }

    #[tokio::test]
    async fn test_follow_up_rejects_empty_question() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let orchestrator = AnalysisOrchestrator::new(provider, "model-x", 8);

        let result = orchestrator
            .follow_up(
                AnalysisKind::FinancialAnalysis,
                None,
                Vec::new(),
                "  ",
                &snapshots(),
            )
            .await;
        assert!(matches!(result, Err(AiError::InvalidRequest(_))));
    }
}
