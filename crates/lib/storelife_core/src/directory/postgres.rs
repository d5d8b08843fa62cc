//! PostgreSQL-backed directory store.

use async_trait::async_trait;
use sqlx::PgPool;

use super::store::{DirectoryStore, fallback_username};
use crate::error::StoreResult;
use crate::models::auth::{UserAccount, UserWithPassword};
use crate::models::directory::{DirectoryDepartment, DirectoryUser, UpsertOutcome};

/// Column list matching [`UserRow`].
const USER_COLUMNS: &str = "id::text, username, display_name, external_id, department_ids, \
     roles, is_active, password_hash";

type UserRow = (
    String,
    String,
    String,
    Option<String>,
    Vec<String>,
    Vec<String>,
    bool,
    Option<String>,
);

fn split_row(row: UserRow) -> UserWithPassword {
    let (id, username, display_name, external_id, department_ids, roles, is_active, hash) = row;
    UserWithPassword {
        user: UserAccount {
            id,
            username,
            display_name,
            external_id,
            department_ids,
            roles,
            is_active,
        },
        password_hash: hash,
    }
}

/// `RETURNING (xmax = 0)` is true for inserts; no row means the
/// `DO UPDATE .. WHERE` filter found nothing to change.
fn outcome(inserted: Option<bool>) -> UpsertOutcome {
    match inserted {
        Some(true) => UpsertOutcome::Created,
        Some(false) => UpsertOutcome::Updated,
        None => UpsertOutcome::Unchanged,
    }
}

/// Directory store over the `users` and `departments` tables.
#[derive(Clone)]
pub struct PgDirectoryStore {
    pool: PgPool,
}

impl PgDirectoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> StoreResult<Option<UserWithPassword>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(split_row))
    }
}

#[async_trait]
impl DirectoryStore for PgDirectoryStore {
    async fn upsert_department(&self, dept: &DirectoryDepartment) -> StoreResult<UpsertOutcome> {
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO departments (external_id, name, parent_external_id, sort_order) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (external_id) DO UPDATE SET \
               name = EXCLUDED.name, \
               parent_external_id = EXCLUDED.parent_external_id, \
               sort_order = EXCLUDED.sort_order, \
               updated_at = now() \
             WHERE (departments.name, departments.parent_external_id, departments.sort_order) \
               IS DISTINCT FROM (EXCLUDED.name, EXCLUDED.parent_external_id, EXCLUDED.sort_order) \
             RETURNING (xmax = 0)",
        )
        .bind(&dept.external_id)
        .bind(&dept.name)
        .bind(&dept.parent_external_id)
        .bind(dept.order)
        .fetch_optional(&self.pool)
        .await?;
        Ok(outcome(inserted))
    }

    async fn upsert_user(&self, user: &DirectoryUser) -> StoreResult<UpsertOutcome> {
        let inserted = sqlx::query_scalar::<_, bool>(
            "INSERT INTO users \
               (username, display_name, external_id, department_ids, mobile, email, position, is_active) \
             VALUES ( \
               CASE WHEN EXISTS (SELECT 1 FROM users WHERE username = $1) THEN $8 ELSE $1 END, \
               $2, $1, $3, $4, $5, $6, $7) \
             ON CONFLICT (external_id) DO UPDATE SET \
               display_name = EXCLUDED.display_name, \
               department_ids = EXCLUDED.department_ids, \
               mobile = EXCLUDED.mobile, \
               email = EXCLUDED.email, \
               position = EXCLUDED.position, \
               is_active = EXCLUDED.is_active, \
               updated_at = now() \
             WHERE (users.display_name, users.department_ids, users.mobile, users.email, \
                    users.position, users.is_active) \
               IS DISTINCT FROM (EXCLUDED.display_name, EXCLUDED.department_ids, EXCLUDED.mobile, \
                    EXCLUDED.email, EXCLUDED.position, EXCLUDED.is_active) \
             RETURNING (xmax = 0)",
        )
        .bind(&user.external_id)
        .bind(&user.name)
        .bind(&user.department_ids)
        .bind(&user.mobile)
        .bind(&user.email)
        .bind(&user.position)
        .bind(user.enabled)
        .bind(fallback_username(&user.external_id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(outcome(inserted))
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<UserAccount>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1::uuid");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        match row {
            Ok(row) => Ok(row.map(|r| split_row(r).user)),
            // Not a UUID: cannot name an existing user.
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("22P02") => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserWithPassword>> {
        self.find_one("username", username).await
    }

    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> StoreResult<Option<UserAccount>> {
        Ok(self
            .find_one("external_id", external_id)
            .await?
            .map(|u| u.user))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xmax_flag_maps_to_outcome() {
        assert_eq!(outcome(Some(true)), UpsertOutcome::Created);
        assert_eq!(outcome(Some(false)), UpsertOutcome::Updated);
        assert_eq!(outcome(None), UpsertOutcome::Unchanged);
    }
}
