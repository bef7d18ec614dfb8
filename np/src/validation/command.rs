//! External validator command
//!
//! Runs `sh -c <command>` with the candidate on stdin. Exit status 0 means the
//! candidate passed. Otherwise every non-empty stdout line is a violation
//! message, falling back to stderr lines when stdout is empty. Lines starting
//! with `warning:` in either stream are collected as warnings instead.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{SchemaValidator, ValidationOutcome, ValidatorError};
use crate::config::ValidatorConfig;

const WARNING_PREFIX: &str = "warning:";

/// Schema validator backed by a shell command
#[derive(Debug, Clone)]
pub struct CommandValidator {
    command: String,
    timeout: Duration,
}

impl CommandValidator {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(config.command.clone(), Duration::from_millis(config.timeout_ms))
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl SchemaValidator for CommandValidator {
    async fn validate(&self, candidate: &[u8]) -> Result<ValidationOutcome, ValidatorError> {
        debug!(command = %self.command, candidate_len = candidate.len(), timeout_ms = self.timeout.as_millis() as u64, "CommandValidator::validate: called");
        let start = Instant::now();

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ValidatorError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        // Feed stdin concurrently so a command that never reads cannot stall us
        if let Some(mut stdin) = child.stdin.take() {
            let input = candidate.to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await {
                    debug!(error = %e, "CommandValidator::validate: stdin closed early");
                }
            });
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                debug!("CommandValidator::validate: command timed out");
                return Err(ValidatorError::Timeout(self.timeout));
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(exit_code, duration_ms = start.elapsed().as_millis() as u64, "CommandValidator::validate: command completed");

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let (stdout_messages, stdout_warnings) = split_lines(&stdout);
        let (stderr_messages, stderr_warnings) = split_lines(&stderr);
        let warnings = [stdout_warnings, stderr_warnings].concat();

        if output.status.success() {
            return Ok(ValidationOutcome::pass().with_warnings(warnings));
        }

        let messages = if !stdout_messages.is_empty() {
            stdout_messages
        } else if !stderr_messages.is_empty() {
            stderr_messages
        } else {
            vec![format!("validator exited with status {}", exit_code)]
        };
        Ok(ValidationOutcome::fail(messages).with_warnings(warnings))
    }
}

/// Split output into (messages, warnings), dropping blank lines
fn split_lines(text: &str) -> (Vec<String>, Vec<String>) {
    let mut messages = Vec::new();
    let mut warnings = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match strip_warning(line) {
            Some(warning) => warnings.push(warning.to_string()),
            None => messages.push(line.to_string()),
        }
    }
    (messages, warnings)
}

fn strip_warning(line: &str) -> Option<&str> {
    let head = line.get(..WARNING_PREFIX.len())?;
    if head.eq_ignore_ascii_case(WARNING_PREFIX) {
        Some(line[WARNING_PREFIX.len()..].trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(command: &str) -> CommandValidator {
        CommandValidator::new(command, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_exit_zero_passes() {
        let outcome = validator("cat > /dev/null").validate(b"{}").await.unwrap();
        assert!(outcome.passed);
        assert!(outcome.messages.is_empty());
    }

    #[tokio::test]
    async fn test_stdout_lines_become_messages() {
        let outcome = validator("printf 'edges is required\\n\\nentry_point is required\\n'; exit 1")
            .validate(b"{}")
            .await
            .unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.messages, vec!["edges is required", "entry_point is required"]);
    }

    #[tokio::test]
    async fn test_stderr_used_when_stdout_empty() {
        let outcome = validator("echo 'bad graph' >&2; exit 2").validate(b"{}").await.unwrap();
        assert_eq!(outcome.messages, vec!["bad graph"]);
    }

    #[tokio::test]
    async fn test_silent_failure_reports_status() {
        let outcome = validator("exit 3").validate(b"{}").await.unwrap();
        assert_eq!(outcome.messages, vec!["validator exited with status 3"]);
    }

    #[tokio::test]
    async fn test_candidate_is_piped_to_stdin() {
        let outcome = validator("grep -q '\"nodes\"' || { echo 'nodes is required'; exit 1; }")
            .validate(br#"{"edges": []}"#)
            .await
            .unwrap();
        assert_eq!(outcome.messages, vec!["nodes is required"]);

        let outcome = validator("grep -q '\"nodes\"'")
            .validate(br#"{"nodes": []}"#)
            .await
            .unwrap();
        assert!(outcome.passed);
    }

    #[tokio::test]
    async fn test_warnings_split_out() {
        let outcome = validator("echo 'WARNING: node b unreachable'; exit 0")
            .validate(b"{}")
            .await
            .unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.warnings, vec!["node b unreachable"]);
    }

    #[tokio::test]
    async fn test_timeout_is_error() {
        let result = CommandValidator::new("sleep 10", Duration::from_millis(100))
            .validate(b"{}")
            .await;
        assert!(matches!(result, Err(ValidatorError::Timeout(_))));
    }
}
