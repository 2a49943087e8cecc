//! Ownership handler

use super::types::{ErrorResponse, StatusResponse};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Json};

/// Report the current owner of the host
#[utoipa::path(
    get,
    path = "/status",
    tag = "Agent",
    summary = "Current owner",
    description = "Show the current owner of the server the agent is running on",
    security(("AuthenticationToken" = [])),
    responses(
        (status = 200, description = "Owner determined", body = StatusResponse),
        (status = 401, description = "Request did not provide a valid authentication token", body = ErrorResponse),
        (status = 403, description = "Request did not come from an allowed IP range", body = ErrorResponse),
        (status = 500, description = "Owner command failed or owner file unreadable", body = StatusResponse)
    )
)]
pub async fn status(State(state): State<AppState>) -> (StatusCode, Json<StatusResponse>) {
    match state.config.owner.identify(state.runner.as_ref()).await {
        Ok(identifier) => (StatusCode::OK, Json(StatusResponse::owner(identifier))),
        Err(e) => {
            e.log();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StatusResponse::failed()),
            )
        }
    }
}
