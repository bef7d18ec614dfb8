//! Route handlers

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::AppState;
use crate::domain::PlanRequest;
use crate::planner::PlanError;

/// Body of `POST /api/v1/validate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub graph_json: String,
}

/// Error body for requests that never reached a planning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

impl ErrorBody {
    fn response(status: StatusCode, kind: &str, error: impl Into<String>) -> Response {
        let body = ErrorBody {
            error: error.into(),
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// HTTP status for a `PlanError::kind()` tag
pub fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "invalid_request" => StatusCode::BAD_REQUEST,
        "extraction_failure" | "validation_failure" | "iteration_budget_exceeded" => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        "retry_exhausted" | "validator_failure" | "analysis_failure" => StatusCode::BAD_GATEWAY,
        "cancelled" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "nodeplanner",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}

pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    if state.shutdown.is_cancelled() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "shutting_down", "timestamp": Utc::now() })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "provider": state.planner.provider(),
            "model": state.planner.model(),
            "timestamp": Utc::now(),
        })),
    )
}

pub async fn plan(State(state): State<AppState>, body: Result<Json<PlanRequest>, JsonRejection>) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "plan: rejected body");
            return ErrorBody::response(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text());
        }
    };

    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    match state.planner.plan(request, &cancel).await {
        Ok(plan) => (StatusCode::OK, Json(plan)).into_response(),
        Err(failure) => (status_for_kind(&failure.error_kind), Json(failure)).into_response(),
    }
}

pub async fn validate(State(state): State<AppState>, body: Result<Json<ValidateRequest>, JsonRejection>) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return ErrorBody::response(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text());
        }
    };

    match state.planner.validate_graph(&request.graph_json).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => error_response(&err),
    }
}

pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.planner.usage())
}

fn error_response(err: &PlanError) -> Response {
    ErrorBody::response(status_for_kind(err.kind()), err.kind(), err.to_string())
}
