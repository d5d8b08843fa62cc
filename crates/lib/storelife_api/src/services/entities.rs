//! Entity lifecycle service: creation and validated status changes.

use storelife_core::entities::EntityStore;
use storelife_core::models::entity::EntityRecord;
use storelife_core::status::{EntityType, available_transitions, validate_transition};
use tracing::info;

use crate::error::{AppError, AppResult};

pub async fn create(
    store: &dyn EntityStore,
    entity_type: EntityType,
    name: &str,
) -> AppResult<EntityRecord> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    let record = store.create(entity_type, name).await?;
    info!(%entity_type, id = %record.id, status = %record.status, "entity created");
    Ok(record)
}

pub async fn get(
    store: &dyn EntityStore,
    entity_type: EntityType,
    id: &str,
) -> AppResult<EntityRecord> {
    store
        .get(entity_type, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{entity_type} {id}")))
}

/// Current status and the statuses reachable from it.
pub async fn transitions(
    store: &dyn EntityStore,
    entity_type: EntityType,
    id: &str,
) -> AppResult<(String, Vec<&'static str>)> {
    let record = get(store, entity_type, id).await?;
    let available = available_transitions(entity_type, &record.status);
    Ok((record.status, available))
}

/// Move a record to `to` if the graph allows it from its current status.
///
/// The write is a compare-and-set on the status that was validated, so two
/// racing changes cannot both apply.
pub async fn change_status(
    store: &dyn EntityStore,
    entity_type: EntityType,
    id: &str,
    to: &str,
) -> AppResult<EntityRecord> {
    let record = get(store, entity_type, id).await?;
    validate_transition(entity_type, &record.status, to)?;

    match store
        .update_status(entity_type, id, &record.status, to)
        .await?
    {
        Some(updated) => {
            info!(%entity_type, id, from = %record.status, to, "status changed");
            Ok(updated)
        }
        None => Err(AppError::Conflict {
            code: "concurrent_modification",
            message: format!("{entity_type} {id} was modified concurrently"),
        }),
    }
}
