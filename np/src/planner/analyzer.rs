//! Task analyzer
//!
//! One model call that classifies a task before planning. Failures are always
//! returned to the caller; whether planning continues without an analysis is
//! decided by the service.

use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::error::AnalysisError;
use super::extractor::Extractor;
use crate::domain::{Complexity, TaskAnalysis};
use crate::llm::ModelGateway;

/// Response budget for the analysis call
const ANALYSIS_MAX_TOKENS: u32 = 1024;

/// Shape the analysis prompt asks the model for
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    complexity: Complexity,
    #[serde(default)]
    requires_tools: bool,
    #[serde(default)]
    requires_routing: bool,
    #[serde(default)]
    suggested_node_types: Vec<String>,
    #[serde(default)]
    key_entities: Vec<String>,
    #[serde(default)]
    intent: String,
    #[serde(default)]
    reasoning: String,
}

/// An analysis and what it cost
#[derive(Debug, Clone)]
pub struct Analyzed {
    pub analysis: TaskAnalysis,
    pub tokens_used: u64,
}

/// Classifies tasks through the model gateway
#[derive(Clone)]
pub struct TaskAnalyzer {
    gateway: ModelGateway,
    system_prompt: String,
    extractor: Extractor,
}

impl TaskAnalyzer {
    pub fn new(gateway: ModelGateway, system_prompt: impl Into<String>) -> Self {
        Self {
            gateway,
            system_prompt: system_prompt.into(),
            extractor: Extractor::without_marker(),
        }
    }

    /// Analyze `task` with exactly one (retry-wrapped) model call
    pub async fn analyze(&self, task: &str, cancel: &CancellationToken) -> Result<Analyzed, AnalysisError> {
        debug!(task_len = task.len(), "TaskAnalyzer::analyze: called");
        let mut request = self.gateway.request(&self.system_prompt, format!("Analyze this task:\n\n{}", task));
        request.max_tokens = request.max_tokens.min(ANALYSIS_MAX_TOKENS);

        let response = self.gateway.complete(request, cancel).await?;
        let analysis = parse_analysis(&self.extractor, &response.content)?;
        debug!(complexity = %analysis.complexity, requires_tools = analysis.requires_tools, requires_routing = analysis.requires_routing, "TaskAnalyzer::analyze: parsed");

        Ok(Analyzed {
            analysis,
            tokens_used: response.tokens_used(),
        })
    }
}

fn parse_analysis(extractor: &Extractor, content: &str) -> Result<TaskAnalysis, AnalysisError> {
    let extraction = extractor.extract(content)?;
    let raw: RawAnalysis = serde_json::from_value(extraction.value)?;
    Ok(TaskAnalysis {
        analysis_id: Uuid::now_v7().to_string(),
        complexity: raw.complexity,
        requires_tools: raw.requires_tools,
        requires_routing: raw.requires_routing,
        suggested_node_types: raw.suggested_node_types,
        key_entities: raw.key_entities,
        intent: raw.intent,
        reasoning: raw.reasoning,
        analyzed_at: Utc::now(),
    })
}
