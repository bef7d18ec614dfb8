//! Model gateway: the retry-wrapped, usage-counted path to the model port
//!
//! Every model call made by the planner (analysis and generation) goes
//! through here, so retry semantics and usage accounting live in one place.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, RetryError, RetryPolicy, UsageStats};
use crate::config::LlmConfig;

/// Retry-wrapped model access shared by one planner service
#[derive(Clone)]
pub struct ModelGateway {
    client: Arc<dyn LlmClient>,
    policy: RetryPolicy,
    usage: Arc<UsageStats>,
    retry_permanent_errors: bool,
    max_tokens: u32,
    temperature: f32,
}

impl ModelGateway {
    /// Create a gateway that retries every failure
    pub fn new(client: Arc<dyn LlmClient>, policy: RetryPolicy, usage: Arc<UsageStats>) -> Self {
        debug!(provider = %client.provider(), model = %client.model(), "ModelGateway::new: called");
        Self {
            client,
            policy,
            usage,
            retry_permanent_errors: true,
            max_tokens: 4096,
            temperature: 0.0,
        }
    }

    /// Create a gateway with the retry policy and sampling defaults from config
    pub fn from_config(client: Arc<dyn LlmClient>, config: &LlmConfig, usage: Arc<UsageStats>) -> Self {
        Self::new(client, RetryPolicy::from_config(&config.retry), usage)
            .with_retry_permanent_errors(config.retry.retry_permanent_errors)
            .with_sampling(config.max_tokens, config.temperature)
    }

    /// Builder: when false, only errors marked retryable by the transport are retried
    pub fn with_retry_permanent_errors(mut self, retry: bool) -> Self {
        self.retry_permanent_errors = retry;
        self
    }

    /// Builder: default max tokens and temperature for requests built by [`Self::request`]
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Build a request using this gateway's sampling defaults
    pub fn request(&self, system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> CompletionRequest {
        CompletionRequest::new(system_prompt, user_prompt, self.max_tokens).with_temperature(self.temperature)
    }

    pub fn provider(&self) -> &str {
        self.client.provider()
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn usage(&self) -> &Arc<UsageStats> {
        &self.usage
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Complete a request, retrying per policy and racing the whole exchange against `cancel`
    pub async fn complete(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse, RetryError<LlmError>> {
        debug!(
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            prompt_len = request.user_prompt.len(),
            "ModelGateway::complete: called"
        );

        let retry_permanent = self.retry_permanent_errors;
        let attempts = self.policy.run_if(
            cancel,
            |attempt| {
                debug!(attempt, "ModelGateway::complete: sending request");
                self.client.complete(request.clone())
            },
            |err: &LlmError| retry_permanent || err.is_retryable(),
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RetryError::Cancelled),
            result = attempts => result,
        };

        match &result {
            Ok(response) => {
                self.usage.record_success(response.usage);
                debug!(
                    tokens = response.tokens_used(),
                    stop_reason = %response.stop_reason,
                    "ModelGateway::complete: received response"
                );
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                self.usage.record_failure();
                warn!(attempts, error = %last, "model call failed after retries");
            }
            Err(RetryError::Cancelled) => {
                debug!("ModelGateway::complete: cancelled");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use async_trait::async_trait;
    use std::time::Duration;

    fn gateway(client: Arc<MockLlmClient>) -> ModelGateway {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10), 2.0);
        ModelGateway::new(client, policy, Arc::new(UsageStats::new()))
    }

    /// Client whose calls never finish
    struct HangingClient;

    #[async_trait]
    impl LlmClient for HangingClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            std::future::pending().await
        }

        fn provider(&self) -> &str {
            "hanging"
        }

        fn model(&self) -> &str {
            "hanging-model"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success() {
        let client = Arc::new(MockLlmClient::new(vec![MockReply::Status(503), MockReply::text("{}")]));
        let gw = gateway(client.clone());

        let response = gw
            .complete(gw.request("sys", "user"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.content, "{}");
        assert_eq!(client.call_count(), 2);
        let snap = gw.usage().snapshot();
        assert_eq!(snap.successful_calls, 1);
        assert_eq!(snap.total_tokens, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_retried_by_default() {
        let client = Arc::new(MockLlmClient::new(vec![MockReply::Status(401); 3]));
        let gw = gateway(client.clone());

        let err = gw
            .complete(gw.request("sys", "user"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(client.call_count(), 3);
        assert_eq!(gw.usage().snapshot().failed_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_fails_fast_when_classified() {
        let client = Arc::new(MockLlmClient::new(vec![MockReply::Status(401), MockReply::text("{}")]));
        let gw = gateway(client.clone()).with_retry_permanent_errors(false);

        let err = gw
            .complete(gw.request("sys", "user"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { attempts: 1, .. }));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_in_flight_call() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10), 2.0);
        let gw = ModelGateway::new(Arc::new(HangingClient), policy, Arc::new(UsageStats::new()));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = gw.complete(gw.request("sys", "user"), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(gw.usage().snapshot().total_calls, 0);
    }

    #[test]
    fn test_request_uses_sampling_defaults() {
        let gw = gateway(Arc::new(MockLlmClient::new(vec![]))).with_sampling(2048, 0.3);
        let req = gw.request("sys", "user");
        assert_eq!(req.max_tokens, 2048);
        assert!((req.temperature - 0.3).abs() < f32::EPSILON);
    }
}
