//! Prompt templates
//!
//! Template loading chain, per file:
//! 1. `{planning.prompt-path}/{file}`
//! 2. Embedded fallback in code
//!
//! Templates use `{{NAME}}` placeholders rendered by [`render`].

pub mod embedded;
mod loader;
mod render;

pub use loader::{ANALYSIS_FILE, ERROR_FIXING_FILE, PLANNING_FILE, PromptLoader, PromptSet, SYSTEM_FILE};
pub use render::{
    SCHEMA_SUMMARY, format_analysis, format_constraints, format_violations, render, render_error_fixing,
    render_planning,
};
