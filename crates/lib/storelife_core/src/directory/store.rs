//! Local mirror of the directory, keyed by external id.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::auth::{UserAccount, UserWithPassword};
use crate::models::directory::{DirectoryDepartment, DirectoryUser, UpsertOutcome};

/// Local users and departments.
///
/// Upserts match on external id and never delete: entries that disappear
/// from the directory stay in place.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn upsert_department(&self, dept: &DirectoryDepartment) -> StoreResult<UpsertOutcome>;

    /// Create or update the local account mirroring `user`.
    ///
    /// New accounts take the external id as username, or
    /// [`fallback_username`] when a local account already holds it. Local
    /// roles and passwords are never touched.
    async fn upsert_user(&self, user: &DirectoryUser) -> StoreResult<UpsertOutcome>;

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<UserAccount>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserWithPassword>>;

    async fn find_user_by_external_id(&self, external_id: &str)
    -> StoreResult<Option<UserAccount>>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Username for a directory account whose userid is already taken locally.
pub fn fallback_username(external_id: &str) -> String {
    format!("{external_id}@wecom")
}

#[derive(Debug, Clone)]
struct StoredUser {
    account: UserAccount,
    password_hash: Option<String>,
    mobile: Option<String>,
    email: Option<String>,
    position: Option<String>,
}

impl StoredUser {
    fn mirrors(&self, user: &DirectoryUser) -> bool {
        self.account.display_name == user.name
            && self.account.department_ids == user.department_ids
            && self.account.is_active == user.enabled
            && self.mobile == user.mobile
            && self.email == user.email
            && self.position == user.position
    }

    fn apply(&mut self, user: &DirectoryUser) {
        self.account.display_name = user.name.clone();
        self.account.department_ids = user.department_ids.clone();
        self.account.is_active = user.enabled;
        self.mobile = user.mobile.clone();
        self.email = user.email.clone();
        self.position = user.position.clone();
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    departments: HashMap<String, DirectoryDepartment>,
    users: HashMap<String, StoredUser>,
}

/// In-memory directory store for tests and development.
#[derive(Debug, Default)]
pub struct MemoryDirectoryStore {
    state: Mutex<DirectoryState>,
}

impl MemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a local (non-directory) account.
    pub fn add_account(
        &self,
        username: &str,
        password_hash: Option<String>,
        roles: Vec<String>,
    ) -> UserAccount {
        let account = UserAccount {
            id: Uuid::now_v7().to_string(),
            username: username.to_string(),
            display_name: username.to_string(),
            external_id: None,
            department_ids: vec![],
            roles,
            is_active: true,
        };
        self.lock().users.insert(
            account.id.clone(),
            StoredUser {
                account: account.clone(),
                password_hash,
                mobile: None,
                email: None,
                position: None,
            },
        );
        account
    }

    pub fn set_active(&self, id: &str, active: bool) {
        if let Some(user) = self.lock().users.get_mut(id) {
            user.account.is_active = active;
        }
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn department_count(&self) -> usize {
        self.lock().departments.len()
    }

    pub fn department(&self, external_id: &str) -> Option<DirectoryDepartment> {
        self.lock().departments.get(external_id).cloned()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn upsert_department(&self, dept: &DirectoryDepartment) -> StoreResult<UpsertOutcome> {
        let mut state = self.lock();
        let outcome = match state.departments.get(&dept.external_id) {
            None => UpsertOutcome::Created,
            Some(existing) if existing == dept => UpsertOutcome::Unchanged,
            Some(_) => UpsertOutcome::Updated,
        };
        if outcome != UpsertOutcome::Unchanged {
            state
                .departments
                .insert(dept.external_id.clone(), dept.clone());
        }
        Ok(outcome)
    }

    async fn upsert_user(&self, user: &DirectoryUser) -> StoreResult<UpsertOutcome> {
        let mut state = self.lock();
        let existing = state
            .users
            .values_mut()
            .find(|u| u.account.external_id.as_deref() == Some(user.external_id.as_str()));
        match existing {
            Some(stored) if stored.mirrors(user) => Ok(UpsertOutcome::Unchanged),
            Some(stored) => {
                stored.apply(user);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let taken = state
                    .users
                    .values()
                    .any(|u| u.account.username == user.external_id);
                let username = if taken {
                    fallback_username(&user.external_id)
                } else {
                    user.external_id.clone()
                };
                let mut stored = StoredUser {
                    account: UserAccount {
                        id: Uuid::now_v7().to_string(),
                        username,
                        display_name: String::new(),
                        external_id: Some(user.external_id.clone()),
                        department_ids: vec![],
                        roles: vec![],
                        is_active: true,
                    },
                    password_hash: None,
                    mobile: None,
                    email: None,
                    position: None,
                };
                stored.apply(user);
                state.users.insert(stored.account.id.clone(), stored);
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn find_user_by_id(&self, id: &str) -> StoreResult<Option<UserAccount>> {
        Ok(self.lock().users.get(id).map(|u| u.account.clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<UserWithPassword>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.account.username == username)
            .map(|u| UserWithPassword {
                user: u.account.clone(),
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> StoreResult<Option<UserAccount>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.account.external_id.as_deref() == Some(external_id))
            .map(|u| u.account.clone()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wecom_user(id: &str, name: &str) -> DirectoryUser {
        DirectoryUser {
            external_id: id.into(),
            name: name.into(),
            department_ids: vec!["1".into()],
            mobile: None,
            email: None,
            position: Some("Store Manager".into()),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn upsert_user_creates_then_updates_then_unchanged() {
        let store = MemoryDirectoryStore::new();
        let user = wecom_user("zhangsan", "Zhang San");
        assert_eq!(store.upsert_user(&user).await.unwrap(), UpsertOutcome::Created);
        assert_eq!(store.upsert_user(&user).await.unwrap(), UpsertOutcome::Unchanged);

        let renamed = wecom_user("zhangsan", "Zhang San (Ops)");
        assert_eq!(store.upsert_user(&renamed).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.user_count(), 1);

        let account = store.find_user_by_external_id("zhangsan").await.unwrap().unwrap();
        assert_eq!(account.username, "zhangsan");
        assert_eq!(account.display_name, "Zhang San (Ops)");
    }

    #[tokio::test]
    async fn upsert_user_preserves_local_roles() {
        let store = MemoryDirectoryStore::new();
        store.upsert_user(&wecom_user("lisi", "Li Si")).await.unwrap();
        {
            let mut state = store.lock();
            let stored = state.users.values_mut().next().unwrap();
            stored.account.roles = vec!["admin".into()];
        }
        store.upsert_user(&wecom_user("lisi", "Li Si 2")).await.unwrap();
        let account = store.find_user_by_external_id("lisi").await.unwrap().unwrap();
        assert_eq!(account.roles, vec!["admin".to_string()]);
    }

    #[tokio::test]
    async fn userid_matching_local_username_gets_fallback() {
        let store = MemoryDirectoryStore::new();
        let local = store.add_account("admin", Some("hash".into()), vec!["admin".into()]);

        let outcome = store.upsert_user(&wecom_user("admin", "WeCom Admin")).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);
        let mirrored = store.find_user_by_external_id("admin").await.unwrap().unwrap();
        assert_eq!(mirrored.username, fallback_username("admin"));
        assert_ne!(mirrored.id, local.id);

        let untouched = store.find_user_by_username("admin").await.unwrap().unwrap();
        assert_eq!(untouched.user, local);
        assert_eq!(
            store.upsert_user(&wecom_user("admin", "WeCom Admin")).await.unwrap(),
            UpsertOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn disabled_directory_user_becomes_inactive() {
        let store = MemoryDirectoryStore::new();
        store.upsert_user(&wecom_user("wangwu", "Wang Wu")).await.unwrap();
        let mut disabled = wecom_user("wangwu", "Wang Wu");
        disabled.enabled = false;
        assert_eq!(store.upsert_user(&disabled).await.unwrap(), UpsertOutcome::Updated);
        let account = store.find_user_by_external_id("wangwu").await.unwrap().unwrap();
        assert!(!account.is_active);
    }

    #[tokio::test]
    async fn upsert_department_outcomes() {
        let store = MemoryDirectoryStore::new();
        let mut dept = DirectoryDepartment {
            external_id: "2".into(),
            name: "East Region".into(),
            parent_external_id: Some("1".into()),
            order: 10,
        };
        assert_eq!(store.upsert_department(&dept).await.unwrap(), UpsertOutcome::Created);
        assert_eq!(store.upsert_department(&dept).await.unwrap(), UpsertOutcome::Unchanged);
        dept.parent_external_id = Some("3".into());
        assert_eq!(store.upsert_department(&dept).await.unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.department("2").unwrap().parent_external_id.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn find_by_username_returns_hash() {
        let store = MemoryDirectoryStore::new();
        let account = store.add_account("admin", Some("hash".into()), vec!["admin".into()]);
        let found = store.find_user_by_username("admin").await.unwrap().unwrap();
        assert_eq!(found.user, account);
        assert_eq!(found.password_hash.as_deref(), Some("hash"));
        assert!(store.find_user_by_username("nobody").await.unwrap().is_none());
    }
}
