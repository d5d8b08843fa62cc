//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use storelife_core::auth::AuthError;
use storelife_core::directory::DirectoryError;
use storelife_core::error::StoreError;
use storelife_core::status::StatusError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Session timed out after inactivity")]
    SessionTimeout,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Conflict: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("External service unavailable: {0}")]
    ExternalServiceUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::AuthenticationFailed(m) => {
                (StatusCode::UNAUTHORIZED, "authentication_failed", m.clone())
            }
            AppError::SessionExpired => (
                StatusCode::UNAUTHORIZED,
                "session_expired",
                "Session expired, please log in again".into(),
            ),
            AppError::SessionTimeout => (
                StatusCode::UNAUTHORIZED,
                "session_timeout",
                "Session timed out after inactivity".into(),
            ),
            AppError::InvalidRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_refresh_token",
                "Invalid refresh token".into(),
            ),
            AppError::InvalidStatusTransition { .. } => (
                StatusCode::CONFLICT,
                "invalid_status_transition",
                self.to_string(),
            ),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, *code, message.clone()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
            AppError::ExternalServiceUnavailable(m) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "external_service_unavailable",
                m.clone(),
            ),
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".into(),
            ),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InvalidStatusTransition { from, to } => Some(json!({ "from": from, "to": to })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            error!(%detail, "internal error");
        }
        let (status, code, message) = self.parts();
        let body = Json(ErrorResponse {
            error: code.to_string(),
            message,
            details: self.details(),
        });
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Cache(e) if e.is_io_error() || e.is_connection_refusal() => {
                AppError::ExternalServiceUnavailable(format!("cache unavailable: {e}"))
            }
            StoreError::Db(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
                AppError::ExternalServiceUnavailable("database unavailable".into())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => {
                AppError::AuthenticationFailed("Invalid credentials".into())
            }
            AuthError::InvalidToken | AuthError::TokenError(_) => {
                AppError::AuthenticationFailed("Invalid token".into())
            }
            AuthError::TokenExpired => AppError::AuthenticationFailed("Token expired".into()),
            AuthError::TokenRevoked => AppError::AuthenticationFailed("Token revoked".into()),
            AuthError::SessionNotFound => AppError::SessionExpired,
            AuthError::SessionTimeout => AppError::SessionTimeout,
            AuthError::InvalidRefreshToken => AppError::InvalidRefreshToken,
            AuthError::Store(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StatusError> for AppError {
    fn from(e: StatusError) -> Self {
        match e {
            StatusError::UnknownEntityType(name) => {
                AppError::NotFound(format!("unknown entity type '{name}'"))
            }
            StatusError::UnknownStatus {
                entity_type,
                status,
            } => AppError::Validation(format!("unknown status '{status}' for {entity_type}")),
            StatusError::InvalidTransition { from, to, .. } => {
                AppError::InvalidStatusTransition { from, to }
            }
        }
    }
}

impl From<DirectoryError> for AppError {
    fn from(e: DirectoryError) -> Self {
        match e {
            unavailable @ (DirectoryError::Http(_)
            | DirectoryError::Api { .. }
            | DirectoryError::NotConfigured(_)) => {
                AppError::ExternalServiceUnavailable(unavailable.to_string())
            }
            DirectoryError::InvalidSchedule(msg) => AppError::Internal(msg),
            DirectoryError::Store(e) => AppError::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn invalid_transition_carries_details() {
        let err = AppError::from(StatusError::InvalidTransition {
            entity_type: storelife_core::status::EntityType::PreparationProject,
            from: "DRAFT".into(),
            to: "COMPLETED".into(),
        });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_status_transition");
        assert_eq!(body["message"], "invalid status transition from DRAFT to COMPLETED");
        assert_eq!(body["details"]["from"], "DRAFT");
        assert_eq!(body["details"]["to"], "COMPLETED");
    }

    #[tokio::test]
    async fn auth_errors_map_to_distinct_codes() {
        let cases = [
            (AuthError::InvalidToken, "authentication_failed"),
            (AuthError::TokenExpired, "authentication_failed"),
            (AuthError::TokenRevoked, "authentication_failed"),
            (AuthError::InvalidCredentials, "authentication_failed"),
            (AuthError::SessionNotFound, "session_expired"),
            (AuthError::SessionTimeout, "session_timeout"),
            (AuthError::InvalidRefreshToken, "invalid_refresh_token"),
        ];
        for (err, code) in cases {
            let (status, body) = body_json(err.into()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], code);
            assert!(body.get("details").is_none());
        }
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let (status, body) = body_json(AppError::Internal("pg password wrong".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[tokio::test]
    async fn unreachable_directory_is_503() {
        let err = AppError::from(DirectoryError::NotConfigured("no corp id".into()));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "external_service_unavailable");
    }
}
