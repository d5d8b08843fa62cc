//! PostgreSQL-backed entity store, one table per entity type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::EntityStore;
use crate::error::StoreResult;
use crate::models::entity::EntityRecord;
use crate::status::EntityType;

const COLUMNS: &str = "id::text, name, status, created_at, updated_at";

type EntityRow = (String, String, String, DateTime<Utc>, DateTime<Utc>);

fn to_record(entity_type: EntityType, row: EntityRow) -> EntityRecord {
    let (id, name, status, created_at, updated_at) = row;
    EntityRecord {
        id,
        entity_type,
        name,
        status,
        created_at,
        updated_at,
    }
}

/// SQLSTATE 22P02: the id is not a UUID, so no row can match.
fn is_invalid_id(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("22P02"))
}

#[derive(Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn create(&self, entity_type: EntityType, name: &str) -> StoreResult<EntityRecord> {
        let sql = format!(
            "INSERT INTO {} (name, status) VALUES ($1, $2) RETURNING {COLUMNS}",
            entity_type.table_name()
        );
        let row = sqlx::query_as::<_, EntityRow>(&sql)
            .bind(name)
            .bind(entity_type.initial_status())
            .fetch_one(&self.pool)
            .await?;
        Ok(to_record(entity_type, row))
    }

    async fn get(&self, entity_type: EntityType, id: &str) -> StoreResult<Option<EntityRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE id = $1::uuid",
            entity_type.table_name()
        );
        match sqlx::query_as::<_, EntityRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => Ok(row.map(|r| to_record(entity_type, r))),
            Err(e) if is_invalid_id(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, entity_type: EntityType) -> StoreResult<Vec<EntityRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} ORDER BY created_at, id",
            entity_type.table_name()
        );
        let rows = sqlx::query_as::<_, EntityRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| to_record(entity_type, r)).collect())
    }

    async fn update_status(
        &self,
        entity_type: EntityType,
        id: &str,
        expected_from: &str,
        to: &str,
    ) -> StoreResult<Option<EntityRecord>> {
        let sql = format!(
            "UPDATE {} SET status = $3, updated_at = now() \
             WHERE id = $1::uuid AND status = $2 RETURNING {COLUMNS}",
            entity_type.table_name()
        );
        match sqlx::query_as::<_, EntityRow>(&sql)
            .bind(id)
            .bind(expected_from)
            .bind(to)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => Ok(row.map(|r| to_record(entity_type, r))),
            Err(e) if is_invalid_id(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
