//! Directory administration handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use storelife_core::directory::sync::{SyncKind, SyncOutcome};
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{SyncRequest, SyncResponse};

/// `POST /admin/directory/sync` — run a sync now and return its report.
///
/// The body is optional; without one a full sync runs. A run of the same
/// kind already in flight yields 409 `sync_in_progress`.
pub async fn trigger_sync_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Bytes,
) -> AppResult<Json<SyncResponse>> {
    let sync = state.sync.as_ref().ok_or_else(|| {
        AppError::ExternalServiceUnavailable("directory sync is not configured".into())
    })?;
    let request: SyncRequest = if body.is_empty() {
        SyncRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("invalid sync request: {e}")))?
    };
    let kind = request.kind.unwrap_or(SyncKind::Full);

    info!(%kind, admin = %user.0.username, "manual directory sync requested");
    match sync.run(kind).await {
        SyncOutcome::Completed(report) => Ok(Json(report.into())),
        SyncOutcome::AlreadyRunning => Err(AppError::Conflict {
            code: "sync_in_progress",
            message: format!("a {kind} directory sync is already running"),
        }),
    }
}
