//! Persistence for status-bearing business entities.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::entity::EntityRecord;
use crate::status::EntityType;

pub use memory::MemoryEntityStore;
pub use postgres::PgEntityStore;

/// Entity records, one collection per [`EntityType`].
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert a record in the type's initial status.
    async fn create(&self, entity_type: EntityType, name: &str) -> StoreResult<EntityRecord>;

    async fn get(&self, entity_type: EntityType, id: &str) -> StoreResult<Option<EntityRecord>>;

    /// Oldest first.
    async fn list(&self, entity_type: EntityType) -> StoreResult<Vec<EntityRecord>>;

    /// Compare-and-set the status.
    ///
    /// Returns `None` when the record is missing or its status is no longer
    /// `expected_from`. Callers validate the transition beforehand.
    async fn update_status(
        &self,
        entity_type: EntityType,
        id: &str,
        expected_from: &str,
        to: &str,
    ) -> StoreResult<Option<EntityRecord>>;

    async fn ping(&self) -> StoreResult<()>;
}
