//! Planner service
//!
//! Ties analysis, the refinement loop and the schema validator together and
//! turns a session into a `PlanResponse` or a `PlanFailure`.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::analyzer::TaskAnalyzer;
use super::error::PlanError;
use super::generator::Generator;
use super::session::RefinementSession;
use crate::config::{Config, PlanningConfig};
use crate::domain::{Attempt, PlanFailure, PlanMetadata, PlanRequest, PlanResponse, TaskAnalysis, ValidationResult};
use crate::llm::{LlmClient, ModelGateway, UsageSnapshot, UsageStats, create_client};
use crate::prompts::PromptSet;
use crate::validation::{CommandValidator, SchemaValidator, validate_document};

/// Entry point for planning requests
#[derive(Clone)]
pub struct PlannerService {
    planning: PlanningConfig,
    gateway: ModelGateway,
    analyzer: TaskAnalyzer,
    generator: Generator,
    validator: Arc<dyn SchemaValidator>,
}

impl PlannerService {
    pub fn new(
        client: Arc<dyn LlmClient>,
        validator: Arc<dyn SchemaValidator>,
        prompts: PromptSet,
        config: &Config,
        usage: Arc<UsageStats>,
    ) -> Self {
        debug!(provider = %client.provider(), model = %client.model(), "PlannerService::new: called");
        let gateway = ModelGateway::from_config(client, &config.llm, usage);
        let prompts = Arc::new(prompts);
        Self {
            planning: config.planning.clone(),
            analyzer: TaskAnalyzer::new(gateway.clone(), prompts.analysis.clone()),
            generator: Generator::new(gateway.clone(), prompts, validator.clone()),
            gateway,
            validator,
        }
    }

    /// Build the service from config: model client, command validator and prompt templates
    pub fn from_config(config: &Config, usage: Arc<UsageStats>) -> Result<Self> {
        let client = create_client(&config.llm)?;
        let validator = Arc::new(CommandValidator::from_config(&config.planning.validator));
        let prompts = PromptSet::load(&config.planning.prompt_path);
        Ok(Self::new(client, validator, prompts, config, usage))
    }

    pub fn provider(&self) -> &str {
        self.gateway.provider()
    }

    pub fn model(&self) -> &str {
        self.gateway.model()
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.gateway.usage().snapshot()
    }

    /// Iteration budget for a request: its own cap when set, never above the configured one
    pub fn iteration_budget(&self, request: &PlanRequest) -> u32 {
        let configured = self.planning.max_iterations.max(1);
        request
            .constraints
            .as_ref()
            .and_then(|c| c.max_iterations)
            .map_or(configured, |requested| requested.min(configured))
            .max(1)
    }

    /// Plan `request`, returning the validated graph or a failure report
    pub async fn plan(&self, request: PlanRequest, cancel: &CancellationToken) -> Result<PlanResponse, PlanFailure> {
        let started = Instant::now();
        let plan_id = Uuid::now_v7().to_string();
        info!(%plan_id, task_len = request.task.len(), "planning request received");

        if request.task.trim().is_empty() {
            let err = PlanError::InvalidRequest("task must not be empty".to_string());
            return Err(self.failure(plan_id, &err, Vec::new(), None, 0, started));
        }

        let mut analysis_tokens = 0;
        let analysis = if self.planning.enable_analysis && !request.skip_analysis {
            match self.analyzer.analyze(&request.task, cancel).await {
                Ok(analyzed) => {
                    analysis_tokens = analyzed.tokens_used;
                    Some(analyzed.analysis)
                }
                Err(err) if err.is_cancelled() => {
                    return Err(self.failure(plan_id, &PlanError::Cancelled, Vec::new(), None, 0, started));
                }
                Err(err) if self.planning.continue_without_analysis => {
                    warn!(%plan_id, error = %err, "task analysis failed, planning without it");
                    None
                }
                Err(err) => {
                    let err = PlanError::Analysis(err);
                    return Err(self.failure(plan_id, &err, Vec::new(), None, 0, started));
                }
            }
        } else {
            None
        };

        let budget = self.iteration_budget(&request);
        let PlanRequest {
            task,
            context,
            constraints,
            ..
        } = request;
        let mut session = RefinementSession::new(task, budget)
            .with_context(context)
            .with_constraints(constraints.filter(|c| !c.is_empty()))
            .with_analysis(analysis.clone());

        let result = self.generator.generate(&mut session, cancel).await;
        let tokens_used = analysis_tokens + session.tokens_used();

        match result {
            Ok(artifact) => {
                let validation_logs = session.validation_logs();
                let attempts = session.into_attempts();
                let iterations = attempts.len() as u32;
                info!(%plan_id, iterations, tokens_used, "plan generated");
                Ok(PlanResponse {
                    plan_id,
                    graph: artifact.graph,
                    graph_json: artifact.graph_json,
                    reasoning: artifact.reasoning,
                    analysis,
                    iterations,
                    attempts,
                    validation_logs,
                    metadata: PlanMetadata {
                        llm_provider: self.provider().to_string(),
                        llm_model: self.model().to_string(),
                        tokens_used,
                        duration_ms: started.elapsed().as_millis() as u64,
                        success: true,
                        error_message: None,
                    },
                    created_at: Utc::now(),
                })
            }
            Err(err) => {
                warn!(%plan_id, kind = err.kind(), error = %err, "planning failed");
                Err(self.failure(plan_id, &err, session.into_attempts(), analysis, tokens_used, started))
            }
        }
    }

    /// Run task analysis on its own
    pub async fn analyze(&self, task: &str, cancel: &CancellationToken) -> Result<TaskAnalysis, PlanError> {
        if task.trim().is_empty() {
            return Err(PlanError::InvalidRequest("task must not be empty".to_string()));
        }
        match self.analyzer.analyze(task, cancel).await {
            Ok(analyzed) => Ok(analyzed.analysis),
            Err(err) if err.is_cancelled() => Err(PlanError::Cancelled),
            Err(err) => Err(PlanError::Analysis(err)),
        }
    }

    /// Check an existing graph against the schema authority
    pub async fn validate_graph(&self, graph_json: &str) -> Result<ValidationResult, PlanError> {
        debug!(len = graph_json.len(), "PlannerService::validate_graph: called");
        Ok(validate_document(self.validator.as_ref(), graph_json).await?)
    }

    fn failure(
        &self,
        plan_id: String,
        err: &PlanError,
        attempts: Vec<Attempt>,
        analysis: Option<TaskAnalysis>,
        tokens_used: u64,
        started: Instant,
    ) -> PlanFailure {
        let error = err.to_string();
        PlanFailure {
            plan_id,
            error_kind: err.kind().to_string(),
            iterations: attempts.len() as u32,
            validation_logs: attempts.iter().map(Attempt::summary).collect(),
            attempts,
            analysis,
            metadata: PlanMetadata {
                llm_provider: self.provider().to_string(),
                llm_model: self.model().to_string(),
                tokens_used,
                duration_ms: started.elapsed().as_millis() as u64,
                success: false,
                error_message: Some(error.clone()),
            },
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Constraints;
    use crate::llm::client::mock::MockLlmClient;
    use crate::validation::ValidationOutcome;
    use crate::validation::mock::ScriptedValidator;

    const ANALYSIS: &str = r#"{"complexity": "simple", "requires_tools": false, "requires_routing": true, "suggested_node_types": ["router"], "key_entities": ["ticket"], "intent": "route", "reasoning": "one router"}"#;
    const GRAPH: &str = r#"{"nodes": [{"id": "a"}], "edges": [], "entry_point": "a"}"#;

    fn prompts() -> PromptSet {
        PromptSet {
            system: "SYSTEM".to_string(),
            planning: "PLAN {{TASK}} {{ANALYSIS}}".to_string(),
            error_fixing: "FIX {{VALIDATION_ERRORS}}".to_string(),
            analysis: "ANALYZE".to_string(),
        }
    }

    fn service(client: Arc<MockLlmClient>, validator: Arc<ScriptedValidator>, config: &Config) -> PlannerService {
        PlannerService::new(client, validator, prompts(), config, Arc::new(UsageStats::new()))
    }

    #[tokio::test]
    async fn test_plan_with_analysis() {
        let client = Arc::new(MockLlmClient::with_texts(vec![ANALYSIS, GRAPH]));
        let svc = service(client.clone(), Arc::new(ScriptedValidator::new(vec![])), &Config::default());

        let plan = svc
            .plan(PlanRequest::new("route tickets"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(plan.iterations, 1);
        assert_eq!(plan.graph_json, GRAPH);
        assert_eq!(plan.graph["entry_point"], "a");
        assert_eq!(plan.analysis.as_ref().map(|a| a.intent.as_str()), Some("route"));
        assert_eq!(plan.validation_logs, vec!["iteration 1: validation passed".to_string()]);
        assert_eq!(plan.metadata.tokens_used, 30);
        assert_eq!(plan.metadata.llm_provider, "mock");
        assert_eq!(plan.metadata.llm_model, "mock-model");
        assert!(plan.metadata.success);

        let requests = client.requests();
        assert_eq!(requests[0].system_prompt, "ANALYZE");
        assert!(requests[1].user_prompt.contains("Complexity: simple"));
        assert_eq!(svc.usage().total_calls, 2);
    }

    #[tokio::test]
    async fn test_empty_task_rejected() {
        let client = Arc::new(MockLlmClient::with_texts(Vec::<String>::new()));
        let svc = service(client.clone(), Arc::new(ScriptedValidator::new(vec![])), &Config::default());

        let failure = svc.plan(PlanRequest::new("   "), &CancellationToken::new()).await.unwrap_err();

        assert_eq!(failure.error_kind, "invalid_request");
        assert_eq!(failure.iterations, 0);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_analysis_failure_continues_by_default() {
        let client = Arc::new(MockLlmClient::with_texts(vec!["I cannot classify this", GRAPH]));
        let svc = service(client, Arc::new(ScriptedValidator::new(vec![])), &Config::default());

        let plan = svc.plan(PlanRequest::new("t"), &CancellationToken::new()).await.unwrap();

        assert!(plan.analysis.is_none());
        assert_eq!(plan.iterations, 1);
    }

    #[tokio::test]
    async fn test_analysis_failure_fatal_when_configured() {
        let mut config = Config::default();
        config.planning.continue_without_analysis = false;
        let client = Arc::new(MockLlmClient::with_texts(vec!["I cannot classify this", GRAPH]));
        let svc = service(client.clone(), Arc::new(ScriptedValidator::new(vec![])), &config);

        let failure = svc.plan(PlanRequest::new("t"), &CancellationToken::new()).await.unwrap_err();

        assert_eq!(failure.error_kind, "analysis_failure");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_skip_analysis() {
        let client = Arc::new(MockLlmClient::with_texts(vec![GRAPH]));
        let svc = service(client.clone(), Arc::new(ScriptedValidator::new(vec![])), &Config::default());

        let plan = svc
            .plan(PlanRequest::new("t").skip_analysis(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(plan.analysis.is_none());
        assert_eq!(client.call_count(), 1);
        assert_eq!(plan.metadata.tokens_used, 15);
    }

    #[tokio::test]
    async fn test_request_budget_is_capped_by_config() {
        let client = Arc::new(MockLlmClient::with_texts(Vec::<String>::new()));
        let svc = service(client, Arc::new(ScriptedValidator::new(vec![])), &Config::default());

        let lower = PlanRequest::new("t").with_constraints(Constraints {
            max_iterations: Some(1),
            ..Default::default()
        });
        let higher = PlanRequest::new("t").with_constraints(Constraints {
            max_iterations: Some(10),
            ..Default::default()
        });
        assert_eq!(svc.iteration_budget(&lower), 1);
        assert_eq!(svc.iteration_budget(&higher), 3);
        assert_eq!(svc.iteration_budget(&PlanRequest::new("t")), 3);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_reports_every_attempt() {
        let client = Arc::new(MockLlmClient::with_texts(vec![GRAPH; 3]));
        let validator = Arc::new(ScriptedValidator::new(vec![
            ValidationOutcome::fail(["edges is required"]),
            ValidationOutcome::fail(["edges is required"]),
            ValidationOutcome::fail(["entry_point is required"]),
        ]));
        let svc = service(client, validator, &Config::default());

        let failure = svc
            .plan(PlanRequest::new("t").skip_analysis(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error_kind, "iteration_budget_exceeded");
        assert_eq!(failure.iterations, 3);
        assert_eq!(failure.attempts.len(), 3);
        assert_eq!(failure.validation_logs.len(), 3);
        assert!(failure.error.contains("entry_point is required"));
        assert!(!failure.metadata.success);
        assert_eq!(failure.metadata.tokens_used, 45);
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let client = Arc::new(MockLlmClient::with_texts(vec![GRAPH]));
        let svc = service(client.clone(), Arc::new(ScriptedValidator::new(vec![])), &Config::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = svc.plan(PlanRequest::new("t"), &cancel).await.unwrap_err();

        assert_eq!(failure.error_kind, "cancelled");
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_validate_graph() {
        let validator = Arc::new(ScriptedValidator::new(vec![ValidationOutcome::fail(["edges is required"])]));
        let client = Arc::new(MockLlmClient::with_texts(Vec::<String>::new()));
        let svc = service(client, validator.clone(), &Config::default());

        let bad_json = svc.validate_graph("{nodes").await.unwrap();
        assert!(!bad_json.valid);
        assert!(bad_json.errors[0].starts_with("invalid JSON"));
        assert!(validator.seen().is_empty());

        let result = svc.validate_graph(GRAPH).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["edges is required".to_string()]);
    }
}
