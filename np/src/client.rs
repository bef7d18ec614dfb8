//! HTTP client for the planner API

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::api::{ErrorBody, ValidateRequest};
use crate::domain::{PlanFailure, PlanRequest, PlanResponse, ValidationResult};

/// Errors from [`PlannerClient`]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server ran a session and reported how it ended
    #[error("planning failed: {0}")]
    Plan(Box<PlanFailure>),

    #[error("API error {status}: {}", .body.error)]
    Api { status: StatusCode, body: ErrorBody },

    #[error("unexpected response {status}: {text}")]
    Unexpected { status: StatusCode, text: String },
}

/// Client for a running planner server
#[derive(Debug, Clone)]
pub struct PlannerClient {
    base_url: String,
    http: Client,
}

impl PlannerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, Duration::from_secs(300))
    }

    /// Client whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(%base_url, "PlannerClient::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /api/v1/plan`
    pub async fn plan(&self, request: &PlanRequest) -> Result<PlanResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/v1/plan", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await?;
        if let Ok(failure) = serde_json::from_str::<PlanFailure>(&text) {
            return Err(ClientError::Plan(Box::new(failure)));
        }
        Err(error_from(status, text))
    }

    /// `POST /api/v1/validate`
    pub async fn validate(&self, graph_json: impl Into<String>) -> Result<ValidationResult, ClientError> {
        let body = ValidateRequest {
            graph_json: graph_json.into(),
        };
        let response = self
            .http
            .post(format!("{}/api/v1/validate", self.base_url))
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<Value, ClientError> {
        let response = self.http.get(format!("{}/health", self.base_url)).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let text = response.text().await?;
    Err(error_from(status, text))
}

fn error_from(status: StatusCode, text: String) -> ClientError {
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => ClientError::Api { status, body },
        Err(_) => ClientError::Unexpected { status, text },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = PlannerClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_error_body_parsed() {
        let err = error_from(
            StatusCode::BAD_REQUEST,
            r#"{"error": "task must not be empty", "kind": "invalid_request"}"#.to_string(),
        );
        match err {
            ClientError::Api { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body.kind, "invalid_request");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_body_kept_verbatim() {
        let err = error_from(StatusCode::NOT_FOUND, "nope".to_string());
        assert_eq!(err.to_string(), "unexpected response 404 Not Found: nope");
    }
}
