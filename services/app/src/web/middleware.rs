//! services/app/src/web/middleware.rs
//!
//! Authentication middleware for the routes that need a logged-in user.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::web::state::AppState;

/// The stored login token, made available to handlers behind `require_auth`.
#[derive(Clone, Debug)]
pub struct AuthToken(pub String);

/// Middleware that lets the request through only when a login token is stored.
///
/// If present, inserts the token into request extensions for handlers to use.
/// If absent, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = state
        .sessions
        .token()
        .await
        .map_err(|e| {
            error!("Failed to read login token: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or_else(|| {
            debug!(path = %req.uri().path(), "Rejected request without login");
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(AuthToken(token));

    Ok(next.run(req).await)
}
