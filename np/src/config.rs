//! nodeplanner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main nodeplanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Refinement loop configuration
    pub planning: PlanningConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks settings and that the LLM API key is available. Call this early
    /// in startup for commands that talk to the model.
    pub fn validate(&self) -> Result<()> {
        self.validate_settings()?;
        self.llm.api_key()?;
        Ok(())
    }

    /// Validate everything except the API key
    pub fn validate_settings(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(eyre::eyre!("Invalid server port: 0"));
        }
        if self.llm.provider.trim().is_empty() {
            return Err(eyre::eyre!("LLM provider is required"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(eyre::eyre!("LLM model is required"));
        }
        if self.llm.retry.max_attempts == 0 {
            return Err(eyre::eyre!("llm.retry.max-attempts must be at least 1"));
        }
        if self.llm.retry.multiplier <= 1.0 {
            return Err(eyre::eyre!(
                "llm.retry.multiplier must be greater than 1.0 (got {})",
                self.llm.retry.multiplier
            ));
        }
        if self.planning.max_iterations == 0 {
            return Err(eyre::eyre!("planning.max-iterations must be at least 1"));
        }
        if self.planning.validator.command.trim().is_empty() {
            return Err(eyre::eyre!("planning.validator.command is required"));
        }
        if parse_level(&self.logging.level).is_none() {
            return Err(eyre::eyre!("Invalid log level: {}", self.logging.level));
        }
        Ok(())
    }

    /// Load configuration with fallback chain, then apply `PLANNER_*` overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Read only the log level, for logging setup before the full load
    ///
    /// Never fails: any problem yields `None` and the caller falls back to INFO.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        if let Ok(level) = std::env::var("PLANNER_LOG_LEVEL")
            && !level.is_empty()
        {
            return Some(level);
        }
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::candidate_paths().into_iter().find(|p| p.exists())?,
        };
        Self::load_from_file(&path).ok().map(|c| c.logging.level)
    }

    /// Read only the log destination; defaults to the log file
    pub fn load_log_output(config_path: Option<&PathBuf>) -> LogOutput {
        let path = match config_path {
            Some(path) => Some(path.clone()),
            None => Self::candidate_paths().into_iter().find(|p| p.exists()),
        };
        path.and_then(|p| Self::load_from_file(&p).ok())
            .map(|c| c.logging.output)
            .unwrap_or_default()
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidate_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Project-local `.nodeplanner.yml`, then `~/.config/nodeplanner/nodeplanner.yml`
    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".nodeplanner.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("nodeplanner").join("nodeplanner.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Override settings from `PLANNER_*` environment variables
    ///
    /// Unset or empty variables are ignored; unparseable numbers are an error.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_string("PLANNER_SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = env_parse("PLANNER_SERVER_PORT")? {
            self.server.port = v;
        }
        if let Some(v) = env_string("PLANNER_LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Some(v) = env_string("PLANNER_LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = env_string("PLANNER_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env_parse("PLANNER_LLM_MAX_TOKENS")? {
            self.llm.max_tokens = v;
        }
        if let Some(v) = env_parse("PLANNER_LLM_TEMPERATURE")? {
            self.llm.temperature = v;
        }
        if let Some(v) = env_parse("PLANNER_MAX_ITERATIONS")? {
            self.planning.max_iterations = v;
        }
        if let Some(v) = env_string("PLANNER_PROMPT_PATH") {
            self.planning.prompt_path = PathBuf::from(v);
        }
        if let Some(v) = env_string("PLANNER_VALIDATOR_COMMAND") {
            self.planning.validator.command = v;
        }
        if let Some(v) = env_string("PLANNER_LOG_LEVEL") {
            self.logging.level = v;
        }
        Ok(())
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| eyre::eyre!("Invalid value for {}: '{}' ({})", name, raw, e)),
        None => Ok(None),
    }
}

/// Map a level name to a tracing level (case-insensitive)
pub fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_uppercase().as_str() {
        "TRACE" => Some(tracing::Level::TRACE),
        "DEBUG" => Some(tracing::Level::DEBUG),
        "INFO" => Some(tracing::Level::INFO),
        "WARN" | "WARNING" => Some(tracing::Level::WARN),
        "ERROR" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    /// Milliseconds to wait for in-flight requests on shutdown
    #[serde(rename = "shutdown-grace-ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_grace_ms: 30_000,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Literal API key; takes precedence over `api-key-env` when set
    #[serde(rename = "api-key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retry policy for model calls
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            timeout_ms: 60_000,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from config or the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| eyre::eyre!("LLM API key not found. Set the {} environment variable.", self.api_key_env))
    }
}

/// Retry configuration for model calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "initial-delay-ms")]
    pub initial_delay_ms: u64,

    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    pub multiplier: f64,

    /// Retry failures the transport marks permanent (e.g. 401) as well
    #[serde(rename = "retry-permanent-errors")]
    pub retry_permanent_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            retry_permanent_errors: true,
        }
    }
}

/// Refinement loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Maximum generate/validate attempts per session
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Directory holding prompt template overrides
    #[serde(rename = "prompt-path")]
    pub prompt_path: PathBuf,

    /// Run the task analyzer before generation
    #[serde(rename = "enable-analysis")]
    pub enable_analysis: bool,

    /// Keep planning when analysis fails
    #[serde(rename = "continue-without-analysis")]
    pub continue_without_analysis: bool,

    /// External schema validator
    pub validator: ValidatorConfig,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            prompt_path: PathBuf::from("./prompts"),
            enable_analysis: true,
            continue_without_analysis: true,
            validator: ValidatorConfig::default(),
        }
    }
}

/// External schema validator command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Shell command; receives the candidate graph JSON on stdin
    pub command: String,

    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            command: "graph-schema-check".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Where log output goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    File,
    Stderr,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,

    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::File,
        }
    }
}
