//! In-memory entity store for tests and development.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::EntityStore;
use crate::error::StoreResult;
use crate::models::entity::EntityRecord;
use crate::status::EntityType;

#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    records: DashMap<String, EntityRecord>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn create(&self, entity_type: EntityType, name: &str) -> StoreResult<EntityRecord> {
        let now = Utc::now();
        let record = EntityRecord {
            id: Uuid::now_v7().to_string(),
            entity_type,
            name: name.to_string(),
            status: entity_type.initial_status().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, entity_type: EntityType, id: &str) -> StoreResult<Option<EntityRecord>> {
        Ok(self
            .records
            .get(id)
            .filter(|r| r.entity_type == entity_type)
            .map(|r| r.clone()))
    }

    async fn list(&self, entity_type: EntityType) -> StoreResult<Vec<EntityRecord>> {
        let mut records: Vec<EntityRecord> = self
            .records
            .iter()
            .filter(|r| r.entity_type == entity_type)
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn update_status(
        &self,
        entity_type: EntityType,
        id: &str,
        expected_from: &str,
        to: &str,
    ) -> StoreResult<Option<EntityRecord>> {
        // The shard write lock makes check-and-set atomic.
        let Some(mut record) = self.records.get_mut(id) else {
            return Ok(None);
        };
        if record.entity_type != entity_type || record.status != expected_from {
            return Ok(None);
        }
        record.status = to.to_string();
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
