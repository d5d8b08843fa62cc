//! Authentication request handlers.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::{AuthenticatedUser, bearer_token};
use crate::models::{
    LoginRequest, LogoutResponse, MeResponse, RefreshRequest, TokenResponse, WeComLoginRequest,
};
use crate::services::auth;

/// `POST /auth/login` — authenticate with username + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::login(
        &state.sessions,
        state.users.as_ref(),
        &body.username,
        &body.password,
    )
    .await?;
    Ok(Json(resp))
}

/// `POST /auth/wecom/login` — authenticate with a WeCom OAuth code.
pub async fn wecom_login_handler(
    State(state): State<AppState>,
    Json(body): Json<WeComLoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::wecom_login(
        &state.sessions,
        state.users.as_ref(),
        state.directory.as_deref(),
        &body.code,
    )
    .await?;
    Ok(Json(resp))
}

/// `POST /auth/refresh` — exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::refresh(&state.sessions, &body.refresh_token).await?;
    Ok(Json(resp))
}

/// `POST /auth/logout` — revoke the bearer token if one is sent. Always succeeds.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<LogoutResponse> {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.logout(token).await;
    }
    Json(LogoutResponse { success: true })
}

/// `GET /auth/me` — the authenticated principal.
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse::from(user.0))
}
