//! Schema-validation port
//!
//! The planner never encodes schema rules. It hands candidate graphs to a
//! `SchemaValidator` and treats the verdict as opaque data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::ValidationResult;

mod command;

pub use command::CommandValidator;

/// Verdict on one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    /// Ordered, human-readable violation messages (empty when passed)
    pub messages: Vec<String>,
    /// Advisory notes that never fail validation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    pub fn fail<S: Into<String>>(messages: impl IntoIterator<Item = S>) -> Self {
        Self {
            passed: false,
            messages: messages.into_iter().map(Into::into).collect(),
            warnings: Vec::new(),
        }
    }

    /// Builder: attach warnings
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

impl From<ValidationOutcome> for ValidationResult {
    fn from(outcome: ValidationOutcome) -> Self {
        ValidationResult {
            valid: outcome.passed,
            errors: outcome.messages,
            warnings: outcome.warnings,
        }
    }
}

/// The validator itself could not produce a verdict
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("failed to start validator '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("validator timed out after {0:?}")]
    Timeout(Duration),

    #[error("validator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Judges candidate graphs
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    /// Validate one candidate document (UTF-8 JSON bytes)
    async fn validate(&self, candidate: &[u8]) -> Result<ValidationOutcome, ValidatorError>;
}

/// Validate a standalone graph document
///
/// Text that is not JSON is reported as invalid without calling the validator.
pub async fn validate_document(validator: &dyn SchemaValidator, text: &str) -> Result<ValidationResult, ValidatorError> {
    if let Err(e) = serde_json::from_str::<serde_json::Value>(text) {
        return Ok(ValidationResult {
            valid: false,
            errors: vec![format!("invalid JSON: {}", e)],
            warnings: Vec::new(),
        });
    }
    Ok(validator.validate(text.as_bytes()).await?.into())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_into_result() {
        let result: ValidationResult = ValidationOutcome::fail(["edges is required"])
            .with_warnings(vec!["unused node".to_string()])
            .into();
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["edges is required"]);
        assert_eq!(result.warnings, vec!["unused node"]);

        let result: ValidationResult = ValidationOutcome::pass().into();
        assert!(result.valid);
        assert!(result.errors.is_empty());
    }
}
