//! Status-bearing entity handlers, shared across all entity types.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use storelife_core::models::entity::EntityRecord;
use storelife_core::status::EntityType;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    ChangeStatusRequest, CreateEntityRequest, EntityListResponse, TransitionsResponse,
};
use crate::services::entities;

fn entity_type(segment: &str) -> AppResult<EntityType> {
    EntityType::from_path_segment(segment)
        .ok_or_else(|| AppError::NotFound(format!("unknown entity collection '{segment}'")))
}

/// `POST /api/{entity}` — create a record in its initial status.
pub async fn create_handler(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Json(body): Json<CreateEntityRequest>,
) -> AppResult<(StatusCode, Json<EntityRecord>)> {
    let et = entity_type(&entity)?;
    let record = entities::create(state.entities.as_ref(), et, &body.name).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /api/{entity}`
pub async fn list_handler(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> AppResult<Json<EntityListResponse>> {
    let et = entity_type(&entity)?;
    let items = state.entities.list(et).await?;
    Ok(Json(EntityListResponse { items }))
}

/// `GET /api/{entity}/{id}`
pub async fn get_handler(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> AppResult<Json<EntityRecord>> {
    let et = entity_type(&entity)?;
    Ok(Json(entities::get(state.entities.as_ref(), et, &id).await?))
}

/// `GET /api/{entity}/{id}/transitions`
pub async fn transitions_handler(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> AppResult<Json<TransitionsResponse>> {
    let et = entity_type(&entity)?;
    let (status, available) = entities::transitions(state.entities.as_ref(), et, &id).await?;
    Ok(Json(TransitionsResponse {
        status,
        available: available.into_iter().map(String::from).collect(),
    }))
}

/// `PATCH /api/{entity}/{id}/status`
pub async fn change_status_handler(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Json(body): Json<ChangeStatusRequest>,
) -> AppResult<Json<EntityRecord>> {
    let et = entity_type(&entity)?;
    let record = entities::change_status(state.entities.as_ref(), et, &id, &body.status).await?;
    Ok(Json(record))
}
