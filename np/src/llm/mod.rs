//! Model access for the planner
//!
//! The `LlmClient` trait is the model-completion port. `ModelGateway` puts the
//! retry policy and usage counters in front of it.

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod gateway;
mod retry;
mod types;
mod usage;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use gateway::ModelGateway;
pub use retry::{Backoff, RetryError, RetryPolicy};
pub use types::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use usage::{UsageSnapshot, UsageStats};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Only "anthropic" is supported today.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: anthropic",
                other
            )))
        }
    }
}
