//! Planner error types

use thiserror::Error;

use super::extractor::ExtractionError;
use crate::llm::{LlmError, RetryError};
use crate::validation::ValidatorError;

/// Why the task analyzer produced nothing
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis model call failed: {0}")]
    Model(#[from] RetryError<LlmError>),

    #[error("analysis response had no usable JSON: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("failed to parse analysis: {0}")]
    Parse(#[from] serde_json::Error),
}

impl AnalysisError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Model(RetryError::Cancelled))
    }
}

/// Why a planning session ended without a validated graph
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("validation failed: {}", .messages.join("; "))]
    Validation { messages: Vec<String> },

    #[error("model call failed after {attempts} attempt(s): {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: LlmError,
    },

    #[error("max iterations ({max_iterations}) exceeded: {last}")]
    IterationBudgetExceeded {
        max_iterations: u32,
        #[source]
        last: Box<PlanError>,
    },

    #[error("task analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("validator failed: {0}")]
    Validator(#[from] ValidatorError),

    #[error("planning cancelled")]
    Cancelled,
}

impl PlanError {
    /// Stable snake_case tag used in API bodies and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::InvalidRequest(_) => "invalid_request",
            PlanError::Extraction(_) => "extraction_failure",
            PlanError::Validation { .. } => "validation_failure",
            PlanError::RetryExhausted { .. } => "retry_exhausted",
            PlanError::IterationBudgetExceeded { .. } => "iteration_budget_exceeded",
            PlanError::Analysis(_) => "analysis_failure",
            PlanError::Validator(_) => "validator_failure",
            PlanError::Cancelled => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlanError::Cancelled)
    }
}

impl From<RetryError<LlmError>> for PlanError {
    fn from(err: RetryError<LlmError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, last } => PlanError::RetryExhausted { attempts, source: last },
            RetryError::Cancelled => PlanError::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_error_conversion() {
        let err: PlanError = RetryError::Exhausted {
            attempts: 3,
            last: LlmError::Timeout(std::time::Duration::from_secs(60)),
        }
        .into();
        assert_eq!(err.kind(), "retry_exhausted");
        assert!(err.to_string().contains("3 attempt(s)"));

        let err: PlanError = RetryError::<LlmError>::Cancelled.into();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_budget_error_surfaces_last_failure() {
        let err = PlanError::IterationBudgetExceeded {
            max_iterations: 3,
            last: Box::new(PlanError::Validation {
                messages: vec!["edges is required".to_string()],
            }),
        };
        assert_eq!(err.kind(), "iteration_budget_exceeded");
        assert_eq!(
            err.to_string(),
            "max iterations (3) exceeded: validation failed: edges is required"
        );
    }

    #[test]
    fn test_analysis_cancel_detected() {
        let err = AnalysisError::Model(RetryError::Cancelled);
        assert!(err.is_cancelled());
        assert!(!AnalysisError::Extraction(ExtractionError::NoJson).is_cancelled());
    }
}
