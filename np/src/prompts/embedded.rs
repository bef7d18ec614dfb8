//! Embedded prompts
//!
//! These are compiled into the binary from the files under `prompts/` and used
//! whenever the configured prompt directory lacks a file.

use tracing::debug;

/// Planner system role
pub const SYSTEM: &str = include_str!("../../prompts/system-prompt.txt");

/// First-attempt planning template
pub const TASK_PLANNING: &str = include_str!("../../prompts/task-planning.txt");

/// Corrective template for attempts after a failure
pub const ERROR_FIXING: &str = include_str!("../../prompts/error-fixing.txt");

/// Task analyzer system role
pub const TASK_ANALYSIS: &str = include_str!("../../prompts/task-analysis.txt");

/// Get the embedded prompt by file name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system-prompt.txt" => Some(SYSTEM),
        "task-planning.txt" => Some(TASK_PLANNING),
        "error-fixing.txt" => Some(ERROR_FIXING),
        "task-analysis.txt" => Some(TASK_ANALYSIS),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planning_template_has_placeholders() {
        for placeholder in ["{{TASK}}", "{{CONTEXT}}", "{{ANALYSIS}}", "{{CONSTRAINTS}}", "{{SCHEMAS}}"] {
            assert!(TASK_PLANNING.contains(placeholder), "missing {}", placeholder);
        }
    }

    #[test]
    fn test_error_fixing_template_has_placeholders() {
        for placeholder in ["{{TASK}}", "{{PREVIOUS_GRAPH}}", "{{VALIDATION_ERRORS}}", "{{ATTEMPT}}"] {
            assert!(ERROR_FIXING.contains(placeholder), "missing {}", placeholder);
        }
    }

    #[test]
    fn test_analysis_prompt_describes_fields() {
        assert!(TASK_ANALYSIS.contains("\"complexity\""));
        assert!(TASK_ANALYSIS.contains("\"requires_routing\""));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("system-prompt.txt").is_some());
        assert!(get_embedded("unknown.txt").is_none());
    }
}
