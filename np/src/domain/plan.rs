//! Planning outputs: the validated plan, the failure report, and validation results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Attempt, TaskAnalysis};

/// A validated execution graph and how it was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub plan_id: String,

    /// The validated graph
    pub graph: Value,

    /// The graph exactly as extracted from the model response
    pub graph_json: String,

    pub reasoning: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<TaskAnalysis>,

    /// Number of refinement attempts performed
    pub iterations: u32,

    /// Per-iteration log, in order
    pub attempts: Vec<Attempt>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_logs: Vec<String>,

    pub metadata: PlanMetadata,

    pub created_at: DateTime<Utc>,
}

/// Provenance and cost of a planning session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub llm_provider: String,
    pub llm_model: String,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A planning session that ended without a validated graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanFailure {
    pub plan_id: String,

    /// Stable snake_case failure kind (e.g. "iteration_budget_exceeded")
    pub error_kind: String,

    /// The error that ended the session
    pub error: String,

    pub iterations: u32,

    pub attempts: Vec<Attempt>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_logs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<TaskAnalysis>,

    pub metadata: PlanMetadata,
}

impl std::fmt::Display for PlanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} after {} iteration(s): {}", self.error_kind, self.iterations, self.error)
    }
}

impl std::error::Error for PlanFailure {}

/// Verdict of the schema authority on a single graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
