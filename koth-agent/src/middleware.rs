//! Request authorization middleware
//!
//! Runs in front of every agent route: token first, caller address second.

use crate::{AppState, WebError};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::debug;

/// Reject requests with a bad token (401) or from outside the allow-list (403)
pub async fn authorize(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, WebError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| value.as_bytes());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Err(rejection) = state.config.auth.authorize(header, peer) {
        debug!(
            peer = ?peer,
            path = %request.uri().path(),
            reason = ?rejection,
            "Request rejected"
        );
        return Err(rejection.into());
    }

    Ok(next.run(request).await)
}
