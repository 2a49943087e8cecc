//! Route definitions for the agent

use crate::{handlers, middleware, AppState};
use axum::{middleware::from_fn_with_state, routing::get, Router};

/// Agent endpoints, each behind the authorization middleware
pub fn agent_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/healthcheck", get(handlers::healthcheck))
        .route_layer(from_fn_with_state(state, middleware::authorize))
}
