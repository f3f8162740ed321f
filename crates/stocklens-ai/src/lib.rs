//! AI provider adapters and analysis orchestration for stocklens
//!
//! A neutral [`ProviderRequest`]/[`ProviderResponse`] pair, the
//! [`AiProvider`] trait, and three adapters (OpenAI-compatible, Gemini,
//! Claude). The [`AnalysisOrchestrator`] builds prompts from security
//! snapshots, dispatches with bounded retry, and stitches truncated
//! answers back together through the continuation loop.

pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod request;
pub mod transcript;

// Re-export main types for convenience
pub use error::{AiError, Result};
pub use orchestrator::{
    gather_search_context, AnalysisOrchestrator, AnalysisOutcome, FinishState, SearchMode,
};
pub use prompt::AnalysisKind;
pub use provider::AiProvider;
pub use providers::{ClaudeProvider, GeminiProvider, OpenAiCompatProvider};
pub use request::{FinishReason, ProviderRequest, ProviderResponse};
pub use transcript::{ChatRole, ChatTurn};
