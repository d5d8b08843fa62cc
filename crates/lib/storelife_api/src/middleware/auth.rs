//! Authentication middleware: bearer token extraction, session verification,
//! and the admin gate.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use storelife_core::models::auth::Principal;
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

/// Key used to store the verified [`Principal`] in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

/// Token from `Authorization: Bearer <token>`, if present and well-formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum middleware: verifies the bearer token against the session cache,
/// records activity, and injects [`AuthenticatedUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::AuthenticationFailed("Missing bearer token".into()))?;

    let principal = state.sessions.verify(token).await?;

    if let Err(e) = state.sessions.touch_activity(&principal.user_id).await {
        warn!(user_id = %principal.user_id, error = %e, "failed to record session activity");
    }

    request.extensions_mut().insert(AuthenticatedUser(principal));
    Ok(next.run(request).await)
}

/// Axum middleware: requires the admin role. Must run after [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = request
        .extensions()
        .get::<AuthenticatedUser>()
        .is_some_and(|u| u.0.is_admin());
    if !is_admin {
        return Err(AppError::Forbidden("Administrator role required".into()));
    }
    Ok(next.run(request).await)
}
