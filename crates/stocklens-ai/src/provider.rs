//! Provider trait implemented by every AI adapter

use crate::error::Result;
use crate::request::{ProviderRequest, ProviderResponse};
use async_trait::async_trait;

/// A text-generation backend.
///
/// Implementations map the neutral request onto their wire format and
/// normalize status codes and finish reasons; the orchestrator never sees
/// vendor detail.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Stable provider label for outcomes and logs.
    fn name(&self) -> &'static str;

    /// Send one request and return the normalized response.
    async fn send(&self, request: &ProviderRequest) -> Result<ProviderResponse>;
}
