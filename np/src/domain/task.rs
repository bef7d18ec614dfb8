//! Planning inputs: the request, its constraints, and the optional task analysis

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// A request to turn a natural-language task into an execution graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Natural-language task description
    pub task: String,

    /// Free-form caller context, rendered into the planning prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,

    /// Skip the task analysis pre-step for this request
    #[serde(default)]
    pub skip_analysis: bool,
}

impl PlanRequest {
    pub fn new(task: impl Into<String>) -> Self {
        let task = task.into();
        debug!(task_len = task.len(), "PlanRequest::new: called");
        Self {
            task,
            ..Default::default()
        }
    }

    /// Builder: set context
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    /// Builder: set constraints
    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = Some(constraints);
        self
    }

    /// Builder: skip analysis
    pub fn skip_analysis(mut self) -> Self {
        self.skip_analysis = true;
        self
    }
}

/// Caller-supplied limits and preferences, never mutated by the planner
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<u32>,

    /// Preferred execution modes (agent, llm, tool)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferred_modes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_tools: Vec<String>,

    /// Per-request iteration budget, clamped to the configured maximum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.max_nodes.is_none()
            && self.preferred_modes.is_empty()
            && self.available_tools.is_empty()
            && self.max_iterations.is_none()
    }
}

/// Estimated task complexity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the task analysis pre-step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalysis {
    pub analysis_id: String,
    pub complexity: Complexity,
    pub requires_tools: bool,
    pub requires_routing: bool,
    #[serde(default)]
    pub suggested_node_types: Vec<String>,
    #[serde(default)]
    pub key_entities: Vec<String>,
    pub intent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
    pub analyzed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_request_minimal_json() {
        let req: PlanRequest = serde_json::from_str(r#"{"task": "summarize emails"}"#).unwrap();
        assert_eq!(req.task, "summarize emails");
        assert!(req.context.is_none());
        assert!(req.constraints.is_none());
        assert!(!req.skip_analysis);
    }

    #[test]
    fn test_plan_request_full_json() {
        let json = r#"{
            "task": "route tickets",
            "context": {"team": "support"},
            "constraints": {"max_nodes": 5, "available_tools": ["sentiment"], "max_iterations": 2},
            "skip_analysis": true
        }"#;
        let req: PlanRequest = serde_json::from_str(json).unwrap();
        let constraints = req.constraints.unwrap();
        assert_eq!(constraints.max_nodes, Some(5));
        assert_eq!(constraints.available_tools, vec!["sentiment"]);
        assert_eq!(constraints.max_iterations, Some(2));
        assert!(req.skip_analysis);
        assert_eq!(req.context.unwrap()["team"], "support");
    }

    #[test]
    fn test_constraints_is_empty() {
        assert!(Constraints::default().is_empty());
        let c = Constraints {
            preferred_modes: vec!["agent".to_string()],
            ..Default::default()
        };
        assert!(!c.is_empty());
    }

    #[test]
    fn test_complexity_serde() {
        assert_eq!(serde_json::to_string(&Complexity::Moderate).unwrap(), "\"moderate\"");
        let c: Complexity = serde_json::from_str("\"complex\"").unwrap();
        assert_eq!(c, Complexity::Complex);
        assert!(serde_json::from_str::<Complexity>("\"Hard\"").is_err());
    }
}
