//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent
///
/// This is the model-completion port. Every planning attempt and every task
/// analysis is a fresh single-turn exchange; no conversation state is kept
/// between calls. Implementations perform exactly one transport round-trip
/// per call; retries live above this trait in [`super::RetryPolicy`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Provider name for response metadata (e.g. "anthropic")
    fn provider(&self) -> &str;

    /// Model identifier for response metadata
    fn model(&self) -> &str;
}
