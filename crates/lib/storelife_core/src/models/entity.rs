//! Status-bearing business entity records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::status::EntityType;

/// Minimal persisted shape shared by every status-bearing entity.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub id: String,
    pub entity_type: EntityType,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
