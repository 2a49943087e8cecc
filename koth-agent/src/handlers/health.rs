//! Health check handler

use super::types::{ErrorResponse, HealthResponse};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Json};

/// Health check endpoint
///
/// The command's output is returned as-is whether it succeeded or not.
#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "Agent",
    summary = "Health check",
    description = "Run the configured health-check command and report its output",
    security(("AuthenticationToken" = [])),
    responses(
        (status = 200, description = "Health-check command succeeded", body = HealthResponse),
        (status = 401, description = "Request did not provide a valid authentication token", body = ErrorResponse),
        (status = 403, description = "Request did not come from an allowed IP range", body = ErrorResponse),
        (status = 500, description = "Health-check command failed", body = HealthResponse)
    )
)]
pub async fn healthcheck(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let result = state.runner.run(&state.config.health_command).await;
    let code = if result.succeeded() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (code, Json(HealthResponse::from(result)))
}
