//! KotH Agent web server
//!
//! Exposes `/status` and `/healthcheck` for a scoring server to poll during a
//! King of the Hill competition.

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;
pub mod tls;

// Re-export main types
pub use server::{AgentServer, AgentServerBuilder};
pub use state::AppState;

use axum::{
    extract::ConnectInfo,
    http::{Request, StatusCode},
    response::{IntoResponse, Json, Response},
    Router,
};
use handlers::ErrorResponse;
use koth_core::{AgentError, AuthRejection};
use std::net::SocketAddr;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{error, info_span, Level};

/// Version reported by `--version`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::agent_routes(state.clone()))
        // Access log: one span per request, tagged with the caller
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let peer = request
                        .extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|ConnectInfo(addr)| *addr);
                    info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        peer = ?peer,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl From<AuthRejection> for WebError {
    fn from(rejection: AuthRejection) -> Self {
        match rejection {
            AuthRejection::Unauthorized => WebError::Unauthorized,
            AuthRejection::Forbidden => WebError::Forbidden,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebError::Forbidden => StatusCode::FORBIDDEN,
            WebError::Server(_) | WebError::Agent(_) => {
                error!(error = %self, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Rejections carry only the generic reason phrase.
        let message = status.canonical_reason().unwrap_or("Error");
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
