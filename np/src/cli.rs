//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use eyre::{Context, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::{Constraints, PlanRequest};

/// NodePlanner - natural-language tasks to validated execution graphs
#[derive(Parser)]
#[command(
    name = "np",
    about = "Turns natural-language tasks into schema-validated execution graphs",
    version = env!("CARGO_PKG_VERSION"),
    after_help = after_help(),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a validated execution graph for a task
    Plan(PlanArgs),

    /// Classify a task without planning it
    Analyze {
        /// Task description
        task: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check a graph file against the schema validator
    Validate {
        /// Graph JSON file
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Run the HTTP API
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Arguments for `np plan`
#[derive(Debug, Clone, clap::Args)]
pub struct PlanArgs {
    /// Task description
    pub task: String,

    /// Caller context as a JSON object
    #[arg(long, value_name = "JSON")]
    pub context: Option<String>,

    /// Maximum nodes in the graph
    #[arg(long)]
    pub max_nodes: Option<u32>,

    /// Maximum refinement iterations (capped by config)
    #[arg(short = 'n', long)]
    pub max_iterations: Option<u32>,

    /// Preferred execution mode (repeatable)
    #[arg(long = "mode", value_name = "MODE")]
    pub preferred_modes: Vec<String>,

    /// Tool available to the graph (repeatable)
    #[arg(long = "tool", value_name = "TOOL")]
    pub available_tools: Vec<String>,

    /// Skip the task analysis step
    #[arg(long)]
    pub skip_analysis: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl PlanArgs {
    /// Build the planning request these arguments describe
    pub fn to_request(&self) -> Result<PlanRequest> {
        debug!(task_len = self.task.len(), "PlanArgs::to_request: called");
        let mut request = PlanRequest::new(self.task.clone());

        if let Some(raw) = &self.context {
            let context: Map<String, Value> =
                serde_json::from_str(raw).context("--context must be a JSON object")?;
            request = request.with_context(context);
        }

        let constraints = Constraints {
            max_nodes: self.max_nodes,
            preferred_modes: self.preferred_modes.clone(),
            available_tools: self.available_tools.clone(),
            max_iterations: self.max_iterations,
        };
        if !constraints.is_empty() {
            request = request.with_constraints(constraints);
        }

        if self.skip_analysis {
            request = request.skip_analysis();
        }
        Ok(request)
    }
}

/// Output format for command results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nodeplanner")
        .join("logs")
        .join("nodeplanner.log")
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}
