//! NodePlanner - natural-language tasks to validated execution graphs
//!
//! CLI entry point: one-shot planning, analysis and validation, or the HTTP API.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nodeplanner::api::{self, AppState};
use nodeplanner::cli::{Cli, Command, OutputFormat, PlanArgs, get_log_path};
use nodeplanner::config::{Config, LogOutput, parse_level};
use nodeplanner::domain::{PlanFailure, PlanResponse, TaskAnalysis, ValidationResult};
use nodeplanner::llm::UsageStats;
use nodeplanner::planner::PlannerService;
use nodeplanner::validation::{CommandValidator, validate_document};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, output: LogOutput) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => parse_level(s).unwrap_or_else(|| {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
            tracing::Level::INFO
        }),
        None => tracing::Level::INFO,
    };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    match output {
        LogOutput::File => {
            let log_path = get_log_path();
            let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
            fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
            let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

            tracing_subscriber::fmt()
                .with_writer(log_file)
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        LogOutput::Stderr => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log settings early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    let log_output = Config::load_log_output(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), log_output)
        .context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(provider = %config.llm.provider, model = %config.llm.model, "NodePlanner loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan(args) => cmd_plan(&config, &args).await,
        Command::Analyze { task, format } => cmd_analyze(&config, &task, format).await,
        Command::Validate { file, format } => cmd_validate(&config, &file, format).await,
        Command::Serve { host, port } => cmd_serve(config, host, port).await,
    }
}

/// Token cancelled on Ctrl-C
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            child.cancel();
        }
    });
    token
}

fn build_service(config: &Config) -> Result<PlannerService> {
    config.validate().context("Invalid configuration")?;
    PlannerService::from_config(config, Arc::new(UsageStats::new())).context("Failed to create planner")
}

async fn cmd_plan(config: &Config, args: &PlanArgs) -> Result<()> {
    debug!(?args, "cmd_plan: called");
    let request = args.to_request()?;
    let service = build_service(config)?;
    let cancel = interrupt_token();

    match service.plan(request, &cancel).await {
        Ok(plan) => {
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                OutputFormat::Text => print_plan(&plan)?,
            }
            Ok(())
        }
        Err(failure) => {
            match args.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&failure)?),
                OutputFormat::Text => print_failure(&failure),
            }
            Err(eyre::eyre!(failure))
        }
    }
}

async fn cmd_analyze(config: &Config, task: &str, format: OutputFormat) -> Result<()> {
    debug!(%task, "cmd_analyze: called");
    let service = build_service(config)?;
    let analysis = service.analyze(task, &interrupt_token()).await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&analysis)?),
        OutputFormat::Text => print_analysis(&analysis),
    }
    Ok(())
}

async fn cmd_validate(config: &Config, file: &Path, format: OutputFormat) -> Result<()> {
    debug!(?file, "cmd_validate: called");
    config.validate_settings().context("Invalid configuration")?;
    let text = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;

    let validator = CommandValidator::from_config(&config.planning.validator);
    let result = validate_document(&validator, &text)
        .await
        .context("Validator failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_validation(&result),
    }
    if result.valid {
        Ok(())
    } else {
        Err(eyre::eyre!("{} is not a valid graph", file.display()))
    }
}

async fn cmd_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    debug!(addr = %config.server.bind_addr(), "cmd_serve: called");

    let service = build_service(&config)?;
    let listener = tokio::net::TcpListener::bind(config.server.bind_addr())
        .await
        .context(format!("Failed to bind {}", config.server.bind_addr()))?;
    println!("NodePlanner API listening on http://{}", listener.local_addr()?);

    let shutdown = interrupt_token();
    let state = AppState::new(service, shutdown);
    api::serve(listener, state, Duration::from_millis(config.server.shutdown_grace_ms)).await
}

fn print_plan(plan: &PlanResponse) -> Result<()> {
    println!("{} {}", "✓".green().bold(), "Plan generated".bold());
    println!("  {} {}", "id:".dimmed(), plan.plan_id);
    println!("  {} {}", "iterations:".dimmed(), plan.iterations);
    println!("  {} {}", "tokens:".dimmed(), plan.metadata.tokens_used);
    println!("  {} {}ms", "duration:".dimmed(), plan.metadata.duration_ms);
    if let Some(analysis) = &plan.analysis {
        println!("  {} {} ({})", "analysis:".dimmed(), analysis.intent, analysis.complexity);
    }
    if !plan.reasoning.is_empty() {
        println!("\n{}\n{}", "Reasoning".bold(), plan.reasoning);
    }
    println!("\n{}\n{}", "Graph".bold(), serde_json::to_string_pretty(&plan.graph)?);
    Ok(())
}

fn print_failure(failure: &PlanFailure) {
    println!("{} {}", "✗".red().bold(), failure.error_kind.red().bold());
    println!("  {}", failure.error);
    for line in &failure.validation_logs {
        println!("  {} {}", "-".dimmed(), line);
    }
}

fn print_analysis(analysis: &TaskAnalysis) {
    println!("{} {}", "Intent:".bold(), analysis.intent);
    println!("{} {}", "Complexity:".bold(), analysis.complexity);
    println!("{} {}", "Requires tools:".bold(), analysis.requires_tools);
    println!("{} {}", "Requires routing:".bold(), analysis.requires_routing);
    if !analysis.suggested_node_types.is_empty() {
        println!("{} {}", "Node types:".bold(), analysis.suggested_node_types.join(", "));
    }
    if !analysis.key_entities.is_empty() {
        println!("{} {}", "Entities:".bold(), analysis.key_entities.join(", "));
    }
    if !analysis.reasoning.is_empty() {
        println!("{} {}", "Reasoning:".bold(), analysis.reasoning);
    }
}

fn print_validation(result: &ValidationResult) {
    if result.valid {
        println!("{} {}", "✓".green().bold(), "valid".green());
    } else {
        println!("{} {}", "✗".red().bold(), "invalid".red());
        for (i, error) in result.errors.iter().enumerate() {
            println!("  {}. {}", i + 1, error);
        }
    }
    for warning in &result.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }
}
