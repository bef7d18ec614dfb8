//! Attempt domain type
//!
//! One generate/extract/validate pass of a refinement session. Attempts are
//! appended to the session log and never modified afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The validator accepted the candidate
    Passed,

    /// No parseable JSON could be recovered from the response
    ExtractionFailed {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },

    /// The validator rejected the candidate
    ValidationFailed { messages: Vec<String> },
}

impl AttemptOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, AttemptOutcome::Passed)
    }

    /// Messages fed into the next corrective prompt
    pub fn feedback(&self) -> Vec<String> {
        match self {
            AttemptOutcome::Passed => Vec::new(),
            AttemptOutcome::ExtractionFailed { reason, detail } => {
                let text = match detail {
                    Some(detail) => format!("{}: {}", reason, detail),
                    None => reason.clone(),
                };
                vec![format!("Extraction error: {}", text)]
            }
            AttemptOutcome::ValidationFailed { messages } => messages.clone(),
        }
    }
}

/// Record of one refinement attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt index
    pub iteration: u32,

    pub prompt: String,

    /// Raw model response
    pub response: String,

    /// Extracted graph JSON, when extraction succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,

    #[serde(default)]
    pub reasoning: String,

    pub outcome: AttemptOutcome,

    pub tokens_used: u64,

    pub duration_ms: u64,

    pub timestamp: DateTime<Utc>,
}

impl Attempt {
    /// One-line summary for validation logs
    pub fn summary(&self) -> String {
        match &self.outcome {
            AttemptOutcome::Passed => format!("iteration {}: validation passed", self.iteration),
            AttemptOutcome::ExtractionFailed { .. } => {
                format!("iteration {}: {}", self.iteration, self.outcome.feedback().join("; "))
            }
            AttemptOutcome::ValidationFailed { messages } => format!(
                "iteration {}: validation failed: {}",
                self.iteration,
                messages.join("; ")
            ),
        }
    }
}
