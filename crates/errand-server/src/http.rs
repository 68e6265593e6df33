//! HTTP surface: request submission and health.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

use errand_core::{CredentialError, TaskResult};
use errand_orchestrator::{Orchestrator, OrchestratorError};

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Request body for submitting an assistant request.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Identity of the delegating user.
    pub user_id: String,

    /// The natural-language request.
    pub text: String,
}

/// Response body for a completed request.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub request_id: String,
    pub response_text: String,
    pub results: Vec<TaskResult>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/requests", post(submit_request))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run one assistant request to completion.
async fn submit_request(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> impl IntoResponse {
    match state
        .orchestrator
        .handle_request(&req.user_id, &req.text)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SubmitResponse {
                request_id: outcome.request_id.to_string(),
                response_text: outcome.response_text,
                results: outcome.results,
            }),
        )
            .into_response(),
        Err(e) => {
            warn!(user_id = %req.user_id, error = %e, "Request failed");
            (
                status_for(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn status_for(e: &OrchestratorError) -> StatusCode {
    match e {
        OrchestratorError::Credential(CredentialError::NotFound(_)) => StatusCode::NOT_FOUND,
        OrchestratorError::Credential(CredentialError::Revoked(_)) => StatusCode::FORBIDDEN,
        OrchestratorError::Unroutable(_) | OrchestratorError::InvalidPlan(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        OrchestratorError::WorkerStartup(_) | OrchestratorError::Registry(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}
