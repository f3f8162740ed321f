//! Concrete AI provider adapters

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::ClaudeProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAiCompatProvider;
