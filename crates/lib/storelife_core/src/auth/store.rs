//! Session cache abstraction and the in-memory backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::StoreResult;
use crate::models::auth::Session;

/// Key-value cache holding session records and blacklisted token hashes.
///
/// Every entry carries a TTL; expired entries behave as absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, user_id: &str) -> StoreResult<Option<Session>>;

    /// Insert or overwrite the session for `session.user_id`.
    async fn put_session(&self, session: &Session, ttl: Duration) -> StoreResult<()>;

    /// Set `last_activity` on the stored session in place, keeping its TTL
    /// and token hashes. Never recreates a missing session.
    ///
    /// Returns `false` when no live session exists for `user_id`.
    async fn touch_session(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn delete_session(&self, user_id: &str) -> StoreResult<()>;

    /// Delete the session only while it still belongs to `access_token_hash`.
    ///
    /// Returns `true` when a session was removed.
    async fn delete_session_if(
        &self,
        user_id: &str,
        access_token_hash: &str,
    ) -> StoreResult<bool>;

    /// User ids with a live session.
    async fn session_user_ids(&self) -> StoreResult<Vec<String>>;

    async fn blacklist(&self, token_hash: &str, ttl: Duration) -> StoreResult<()>;

    async fn is_blacklisted(&self, token_hash: &str) -> StoreResult<bool>;

    /// Round-trip to the backend, for health checks.
    async fn ping(&self) -> StoreResult<()>;
}

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

/// Process-local session store for tests and single-node development.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Expiring<Session>>,
    blacklist: DashMap<String, Instant>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_session(&self, user_id: &str) -> StoreResult<Option<Session>> {
        let now = Instant::now();
        if let Some(entry) = self.sessions.get(user_id)
            && entry.expires_at > now
        {
            return Ok(Some(entry.value.clone()));
        }
        self.sessions.remove_if(user_id, |_, e| e.expires_at <= now);
        Ok(None)
    }

    async fn put_session(&self, session: &Session, ttl: Duration) -> StoreResult<()> {
        self.sessions.insert(
            session.user_id.clone(),
            Expiring {
                value: session.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn touch_session(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        match self.sessions.get_mut(user_id) {
            Some(mut entry) if entry.expires_at > Instant::now() => {
                entry.value.last_activity = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_session(&self, user_id: &str) -> StoreResult<()> {
        self.sessions.remove(user_id);
        Ok(())
    }

    async fn delete_session_if(
        &self,
        user_id: &str,
        access_token_hash: &str,
    ) -> StoreResult<bool> {
        Ok(self
            .sessions
            .remove_if(user_id, |_, e| e.value.access_token_hash == access_token_hash)
            .is_some())
    }

    async fn session_user_ids(&self) -> StoreResult<Vec<String>> {
        let now = Instant::now();
        Ok(self
            .sessions
            .iter()
            .filter(|e| e.expires_at > now)
            .map(|e| e.key().clone())
            .collect())
    }

    async fn blacklist(&self, token_hash: &str, ttl: Duration) -> StoreResult<()> {
        self.blacklist
            .insert(token_hash.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn is_blacklisted(&self, token_hash: &str) -> StoreResult<bool> {
        let now = Instant::now();
        let listed = self
            .blacklist
            .get(token_hash)
            .is_some_and(|expires_at| *expires_at > now);
        if !listed {
            self.blacklist.remove_if(token_hash, |_, exp| *exp <= now);
        }
        Ok(listed)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
