//! Directory (WeCom) models mirrored into local tables.

use serde::{Deserialize, Serialize};

/// Department as reported by the external directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryDepartment {
    pub external_id: String,
    pub name: String,
    pub parent_external_id: Option<String>,
    pub order: i64,
}

/// User as reported by the external directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub external_id: String,
    pub name: String,
    pub department_ids: Vec<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub position: Option<String>,
    pub enabled: bool,
}

/// Result of an upsert keyed by external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}
