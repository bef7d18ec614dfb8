//! NodePlanner - natural-language tasks to validated execution graphs
//!
//! A planner asks a language model for an execution graph, extracts the JSON
//! from the free-form reply, and hands it to an external schema validator.
//! Rejections are fed back into a corrective prompt until the graph passes or
//! the iteration budget runs out.
//!
//! # Modules
//!
//! - [`planner`] - Refinement loop, task analysis and the planner service
//! - [`llm`] - LLM client trait, Anthropic implementation, retrying gateway
//! - [`validation`] - Schema-validator port and the command-backed validator
//! - [`prompts`] - Prompt templates and rendering
//! - [`domain`] - Requests, attempts, plans and failures
//! - [`api`] / [`client`] - HTTP API and its client
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod llm;
pub mod planner;
pub mod prompts;
pub mod validation;

// Re-export commonly used types
pub use client::{ClientError, PlannerClient};
pub use config::{Config, LlmConfig};
pub use domain::{
    Attempt, AttemptOutcome, Complexity, Constraints, PlanFailure, PlanMetadata, PlanRequest, PlanResponse,
    TaskAnalysis, ValidationResult,
};
pub use llm::{AnthropicClient, CompletionRequest, CompletionResponse, LlmClient, LlmError, ModelGateway, create_client};
pub use planner::{ExtractionError, Extractor, PlanError, PlannerService};
pub use validation::{CommandValidator, SchemaValidator, ValidationOutcome, ValidatorError};
