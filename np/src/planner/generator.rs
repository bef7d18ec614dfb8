//! Refinement loop
//!
//! Drives up to `max_iterations` attempts of prompt, model call, extraction
//! and validation. Extraction and validation failures become feedback for the
//! next attempt; retry exhaustion, validator breakage and cancellation end the
//! session at once.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::PlanError;
use super::extractor::{Extraction, Extractor};
use super::session::RefinementSession;
use crate::domain::{Attempt, AttemptOutcome};
use crate::llm::ModelGateway;
use crate::prompts::{PromptSet, render_error_fixing, render_planning};
use crate::validation::SchemaValidator;

/// The validated artifact of a successful session
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub graph: Value,
    pub graph_json: String,
    pub reasoning: String,
}

/// Result of one recorded attempt
enum Step {
    Passed(Artifact),
    Failed(PlanError),
}

/// Generates graphs with iterative refinement
#[derive(Clone)]
pub struct Generator {
    gateway: ModelGateway,
    prompts: Arc<PromptSet>,
    extractor: Extractor,
    validator: Arc<dyn SchemaValidator>,
}

impl Generator {
    pub fn new(gateway: ModelGateway, prompts: Arc<PromptSet>, validator: Arc<dyn SchemaValidator>) -> Self {
        Self {
            gateway,
            prompts,
            extractor: Extractor::default(),
            validator,
        }
    }

    /// Run the loop until an attempt passes, the budget runs out, or a fatal error
    ///
    /// Every completed attempt is recorded in `session`, whatever the result.
    pub async fn generate(
        &self,
        session: &mut RefinementSession,
        cancel: &CancellationToken,
    ) -> Result<Artifact, PlanError> {
        debug!(max_iterations = session.max_iterations(), "Generator::generate: called");
        let mut last_error: Option<PlanError> = None;

        while session.has_budget() {
            if cancel.is_cancelled() {
                debug!("Generator::generate: cancelled between iterations");
                session.cancel();
                return Err(PlanError::Cancelled);
            }

            match self.attempt(session, cancel).await {
                Ok(Step::Passed(artifact)) => return Ok(artifact),
                Ok(Step::Failed(err)) => last_error = Some(err),
                Err(err) => {
                    if err.is_cancelled() {
                        session.cancel();
                    } else {
                        session.fail();
                    }
                    return Err(err);
                }
            }
        }

        session.fail();
        let max_iterations = session.max_iterations();
        warn!(max_iterations, "planning ran out of iterations");
        Err(match last_error {
            Some(last) => PlanError::IterationBudgetExceeded {
                max_iterations,
                last: Box::new(last),
            },
            None => PlanError::InvalidRequest("iteration budget is zero".to_string()),
        })
    }

    /// One recorded pass; `Err` is fatal and leaves no attempt behind
    async fn attempt(&self, session: &mut RefinementSession, cancel: &CancellationToken) -> Result<Step, PlanError> {
        let iteration = session.next_iteration();
        info!(iteration, max_iterations = session.max_iterations(), "starting iteration");

        let prompt = self.build_prompt(session, iteration);
        let started = Instant::now();
        let timestamp = Utc::now();

        let request = self.gateway.request(&self.prompts.system, &prompt);
        let response = self.gateway.complete(request, cancel).await?;
        let tokens_used = response.tokens_used();

        let extraction = match self.extractor.extract(&response.content) {
            Ok(extraction) => extraction,
            Err(err) => {
                info!(iteration, error = %err, "extraction failed");
                session.record(Attempt {
                    iteration,
                    prompt,
                    response: response.content,
                    candidate: None,
                    reasoning: String::new(),
                    outcome: AttemptOutcome::ExtractionFailed {
                        reason: err.reason().to_string(),
                        detail: err.detail().map(str::to_string),
                    },
                    tokens_used,
                    duration_ms: started.elapsed().as_millis() as u64,
                    timestamp,
                });
                return Ok(Step::Failed(PlanError::Extraction(err)));
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PlanError::Cancelled),
            outcome = self.validator.validate(extraction.json.as_bytes()) => outcome?,
        };

        let Extraction { json, value, reasoning } = extraction;
        let passed = outcome.passed;
        let messages = outcome.messages;
        let attempt_outcome = if passed {
            info!(iteration, "validation passed");
            AttemptOutcome::Passed
        } else {
            info!(iteration, violations = messages.len(), "validation failed");
            AttemptOutcome::ValidationFailed {
                messages: messages.clone(),
            }
        };

        session.record(Attempt {
            iteration,
            prompt,
            response: response.content,
            candidate: Some(json.clone()),
            reasoning: reasoning.clone(),
            outcome: attempt_outcome,
            tokens_used,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp,
        });

        if passed {
            Ok(Step::Passed(Artifact {
                graph: value,
                graph_json: json,
                reasoning,
            }))
        } else {
            Ok(Step::Failed(PlanError::Validation { messages }))
        }
    }

    /// Planning template for attempt 1, corrective template seeded with the previous attempt after that
    fn build_prompt(&self, session: &RefinementSession, iteration: u32) -> String {
        match session.last_attempt() {
            None => render_planning(
                &self.prompts.planning,
                &session.task,
                session.context.as_ref(),
                session.analysis.as_ref(),
                session.constraints.as_ref(),
            ),
            Some(previous) => {
                let previous_graph = previous.candidate.as_deref().unwrap_or(&previous.response);
                render_error_fixing(
                    &self.prompts.error_fixing,
                    &session.task,
                    previous_graph,
                    &previous.outcome.feedback(),
                    iteration,
                )
            }
        }
    }
}
