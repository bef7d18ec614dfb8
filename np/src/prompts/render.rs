//! Placeholder rendering
//!
//! Templates use `{{NAME}}` placeholders. Rendering is one left-to-right pass:
//! known names are replaced, unknown ones stay as literal text, and inserted
//! values are never scanned again.

use serde_json::{Map, Value};

use crate::domain::{Constraints, TaskAnalysis};

/// Schema summary given to the model in place of the full JSON schemas
pub const SCHEMA_SUMMARY: &str = "Schemas:
- graph: nodes, edges and entry_point
- executor node: modes agent, llm, tool
- router node: modes deterministic, llm, hybrid";

/// Replace every known `{{NAME}}` in `template` with its value
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let value = after_open.find("}}").and_then(|close| {
            let name = &after_open[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after_open[close + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Render the first-attempt planning prompt
pub fn render_planning(
    template: &str,
    task: &str,
    context: Option<&Map<String, Value>>,
    analysis: Option<&TaskAnalysis>,
    constraints: Option<&Constraints>,
) -> String {
    let context = format_context(context);
    let analysis = analysis.map(format_analysis).unwrap_or_default();
    let constraints = constraints.map(format_constraints).unwrap_or_default();
    render(
        template,
        &[
            ("TASK", task),
            ("CONTEXT", &context),
            ("ANALYSIS", &analysis),
            ("CONSTRAINTS", &constraints),
            ("SCHEMAS", SCHEMA_SUMMARY),
        ],
    )
}

/// Render a corrective prompt seeded with the previous attempt
pub fn render_error_fixing(template: &str, task: &str, previous_graph: &str, messages: &[String], attempt: u32) -> String {
    let errors = format_violations(messages);
    let attempt = attempt.to_string();
    render(
        template,
        &[
            ("TASK", task),
            ("PREVIOUS_GRAPH", previous_graph),
            ("VALIDATION_ERRORS", &errors),
            ("ATTEMPT", &attempt),
        ],
    )
}

/// `1. first`, `2. second`, one per line
pub fn format_violations(messages: &[String]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("{}. {}", i + 1, msg))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_analysis(analysis: &TaskAnalysis) -> String {
    let mut out = String::from("Task Analysis:\n");
    out.push_str(&format!("- Complexity: {}\n", analysis.complexity));
    out.push_str(&format!("- Requires Tools: {}\n", analysis.requires_tools));
    out.push_str(&format!("- Requires Routing: {}\n", analysis.requires_routing));
    if !analysis.suggested_node_types.is_empty() {
        out.push_str(&format!(
            "- Suggested Node Types: {}\n",
            analysis.suggested_node_types.join(", ")
        ));
    }
    if !analysis.key_entities.is_empty() {
        out.push_str(&format!("- Key Entities: {}\n", analysis.key_entities.join(", ")));
    }
    out.push_str(&format!("- Intent: {}\n", analysis.intent));
    out
}

/// Empty when no constraint is set
pub fn format_constraints(constraints: &Constraints) -> String {
    let mut lines = Vec::new();
    if let Some(max_nodes) = constraints.max_nodes {
        lines.push(format!("- Max Nodes: {}", max_nodes));
    }
    if !constraints.preferred_modes.is_empty() {
        lines.push(format!("- Preferred Modes: {}", constraints.preferred_modes.join(", ")));
    }
    if !constraints.available_tools.is_empty() {
        lines.push(format!("- Available Tools: {}", constraints.available_tools.join(", ")));
    }
    if lines.is_empty() {
        return String::new();
    }
    format!("Constraints:\n{}\n", lines.join("\n"))
}

fn format_context(context: Option<&Map<String, Value>>) -> String {
    match context {
        Some(map) if !map.is_empty() => {
            let pretty = serde_json::to_string_pretty(map).unwrap_or_default();
            format!("Context:\n{}\n", pretty)
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Complexity;
    use chrono::Utc;

    #[test]
    fn test_render_replaces_known_placeholders() {
        let out = render("Task: {{TASK}} ({{TASK}})", &[("TASK", "sort mail")]);
        assert_eq!(out, "Task: sort mail (sort mail)");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = render("{{TASK}} {{UNKNOWN}} {{", &[("TASK", "x")]);
        assert_eq!(out, "x {{UNKNOWN}} {{");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render("{{TASK}} {{ATTEMPT}}", &[("TASK", "{{ATTEMPT}}"), ("ATTEMPT", "2")]);
        assert_eq!(out, "{{ATTEMPT}} 2");
    }

    #[test]
    fn test_render_handles_nested_braces() {
        let out = render("{{ {{TASK}} }}", &[("TASK", "x")]);
        assert_eq!(out, "{{ x }}");
    }

    #[test]
    fn test_format_violations_two_messages() {
        let messages = vec!["edges is required".to_string(), "entry_point is required".to_string()];
        assert_eq!(
            format_violations(&messages),
            "1. edges is required\n2. entry_point is required"
        );
        assert_eq!(format_violations(&[]), "");
    }

    #[test]
    fn test_render_planning_without_optionals() {
        let out = render_planning("{{TASK}}|{{CONTEXT}}|{{ANALYSIS}}|{{CONSTRAINTS}}", "t", None, None, None);
        assert_eq!(out, "t|||");
    }

    #[test]
    fn test_render_planning_with_analysis_and_constraints() {
        let analysis = TaskAnalysis {
            analysis_id: "a1".to_string(),
            complexity: Complexity::Moderate,
            requires_tools: true,
            requires_routing: true,
            suggested_node_types: vec!["executor".to_string(), "router".to_string()],
            key_entities: vec!["ticket".to_string()],
            intent: "route tickets".to_string(),
            reasoning: String::new(),
            analyzed_at: Utc::now(),
        };
        let constraints = Constraints {
            max_nodes: Some(4),
            available_tools: vec!["sentiment".to_string()],
            ..Default::default()
        };
        let mut context = Map::new();
        context.insert("team".to_string(), Value::String("support".to_string()));

        let out = render_planning(
            "{{ANALYSIS}}{{CONSTRAINTS}}{{CONTEXT}}",
            "t",
            Some(&context),
            Some(&analysis),
            Some(&constraints),
        );
        assert!(out.contains("- Complexity: moderate"));
        assert!(out.contains("- Suggested Node Types: executor, router"));
        assert!(out.contains("- Max Nodes: 4"));
        assert!(out.contains("- Available Tools: sentiment"));
        assert!(!out.contains("Preferred Modes"));
        assert!(out.contains("\"team\": \"support\""));
    }

    #[test]
    fn test_render_error_fixing() {
        let out = render_error_fixing(
            "{{TASK}}\n{{PREVIOUS_GRAPH}}\n{{VALIDATION_ERRORS}}\nattempt {{ATTEMPT}}",
            "route",
            "{\"nodes\": []}",
            &["edges is required".to_string()],
            2,
        );
        assert_eq!(out, "route\n{\"nodes\": []}\n1. edges is required\nattempt 2");
    }

    #[test]
    fn test_empty_constraints_render_empty() {
        assert_eq!(format_constraints(&Constraints::default()), "");
    }
}
