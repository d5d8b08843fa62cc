//! Liveness/readiness probe.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

fn label(ok: bool) -> String {
    if ok { "connected" } else { "disconnected" }.to_string()
}

/// `GET /health` — 200 when the database and cache both answer, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (db, cache) = tokio::join!(state.entities.ping(), state.sessions.store().ping());
    if let Err(e) = &db {
        warn!(error = %e, "health: database unreachable");
    }
    if let Err(e) = &cache {
        warn!(error = %e, "health: cache unreachable");
    }

    let healthy = db.is_ok() && cache.is_ok();
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        database: label(db.is_ok()),
        cache: label(cache.is_ok()),
        version: storelife_core::version().to_string(),
    };
    (status, Json(body))
}
