//! Redis-backed session store.
//!
//! **Key format**:
//! - `session:{user_id}` — JSON-encoded [`Session`], `SET .. EX` refresh-token lifetime
//! - `token:blacklist:{sha256}` — marker, `SET .. EX` remaining token lifetime

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use super::store::SessionStore;
use crate::error::StoreResult;
use crate::models::auth::Session;

const SESSION_PREFIX: &str = "session:";
const BLACKLIST_PREFIX: &str = "token:blacklist:";

/// Rewrites `last_activity` inside the stored JSON, keeping the TTL and token
/// hashes. A missing key stays missing. Needs Redis 6+ for `KEEPTTL`.
const TOUCH_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return 0
end
local session = cjson.decode(raw)
session['last_activity'] = ARGV[1]
redis.call('SET', KEYS[1], cjson.encode(session), 'KEEPTTL')
return 1
"#;

/// Deletes the session only while its access-token hash is `ARGV[1]`.
const DELETE_IF_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
    return 0
end
if cjson.decode(raw)['access_token_hash'] ~= ARGV[1] then
    return 0
end
return redis.call('DEL', KEYS[1])
"#;

const SCAN_BATCH: usize = 200;

/// Session store using a shared Redis connection manager.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Open a client for `redis_url` and wrap it in a reconnecting manager.
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        info!("redis session store connected");
        Ok(Self::new(manager))
    }

    fn session_key(user_id: &str) -> String {
        format!("{SESSION_PREFIX}{user_id}")
    }

    fn blacklist_key(token_hash: &str) -> String {
        format!("{BLACKLIST_PREFIX}{token_hash}")
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        // EX 0 is rejected by Redis.
        let secs = ttl.as_secs().max(1);
        let mut conn = self.redis.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(secs)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get_session(&self, user_id: &str) -> StoreResult<Option<Session>> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = conn.get(Self::session_key(user_id)).await?;
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    async fn put_session(&self, session: &Session, ttl: Duration) -> StoreResult<()> {
        let json = serde_json::to_string(session)?;
        self.set_ex(&Self::session_key(&session.user_id), &json, ttl)
            .await
    }

    async fn touch_session(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut conn = self.redis.clone();
        let touched: i64 = redis::Script::new(TOUCH_SCRIPT)
            .key(Self::session_key(user_id))
            .arg(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            .invoke_async(&mut conn)
            .await?;
        Ok(touched == 1)
    }

    async fn delete_session(&self, user_id: &str) -> StoreResult<()> {
        let mut conn = self.redis.clone();
        let _: () = conn.del(Self::session_key(user_id)).await?;
        debug!(user_id, "session deleted");
        Ok(())
    }

    async fn delete_session_if(
        &self,
        user_id: &str,
        access_token_hash: &str,
    ) -> StoreResult<bool> {
        let mut conn = self.redis.clone();
        let deleted: i64 = redis::Script::new(DELETE_IF_SCRIPT)
            .key(Self::session_key(user_id))
            .arg(access_token_hash)
            .invoke_async(&mut conn)
            .await?;
        if deleted == 1 {
            debug!(user_id, "session deleted");
        }
        Ok(deleted == 1)
    }

    async fn session_user_ids(&self) -> StoreResult<Vec<String>> {
        let mut conn = self.redis.clone();
        let pattern = format!("{SESSION_PREFIX}*");
        let mut cursor: u64 = 0;
        let mut ids = Vec::new();
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            ids.extend(
                keys.iter()
                    .filter_map(|k| k.strip_prefix(SESSION_PREFIX))
                    .map(str::to_string),
            );
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once.
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn blacklist(&self, token_hash: &str, ttl: Duration) -> StoreResult<()> {
        self.set_ex(&Self::blacklist_key(token_hash), "1", ttl).await
    }

    async fn is_blacklisted(&self, token_hash: &str) -> StoreResult<bool> {
        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(Self::blacklist_key(token_hash)).await?;
        Ok(exists)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
