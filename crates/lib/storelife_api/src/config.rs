//! API server configuration.

use std::str::FromStr;

use storelife_core::auth::TokenSettings;
use storelife_core::auth::jwt::resolve_jwt_secret;
use storelife_core::auth::sweep::DEFAULT_SWEEP_INTERVAL_SECS;
use storelife_core::auth::session::{
    DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_REFRESH_TOKEN_TTL_SECS,
};
use storelife_core::directory::schedule::{DEFAULT_DAILY_HOUR, DEFAULT_UTC_OFFSET_HOURS};
use storelife_core::directory::wecom::{DEFAULT_BASE_URL, WeComConfig};
use tracing::warn;

/// WeCom credentials. Absent when either id or secret is unset.
#[derive(Clone, Debug)]
pub struct WeComSettings {
    pub corp_id: String,
    pub corp_secret: String,
    pub base_url: String,
    pub root_department_id: String,
}

impl WeComSettings {
    pub fn client_config(&self) -> WeComConfig {
        let mut config = WeComConfig::new(&self.corp_id, &self.corp_secret)
            .with_base_url(&self.base_url);
        config.root_department_id = self.root_department_id.clone();
        config
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Redis connection URL for sessions and the token blacklist.
    pub redis_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub session_idle_timeout_secs: i64,
    /// How often idle sessions are swept from the cache. `0` disables it.
    pub session_sweep_interval_secs: u64,
    pub wecom: Option<WeComSettings>,
    pub sync_enabled: bool,
    pub sync_daily_hour: u32,
    pub sync_utc_offset_hours: i32,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                      | Default                          |
    /// |-------------------------------|----------------------------------|
    /// | `BIND_ADDR`                   | `127.0.0.1:3100`                 |
    /// | `DATABASE_URL`                | `postgres://localhost:5432/storelife` |
    /// | `REDIS_URL`                   | `redis://127.0.0.1:6379`         |
    /// | `JWT_SECRET` / `AUTH_SECRET`  | generated & persisted to file    |
    /// | `ACCESS_TOKEN_TTL_SECS`       | `604800` (7 days)                |
    /// | `REFRESH_TOKEN_TTL_SECS`      | `2592000` (30 days)              |
    /// | `SESSION_IDLE_TIMEOUT_SECS`   | `86400` (24 hours)               |
    /// | `SESSION_SWEEP_INTERVAL_SECS` | `900` (15 minutes)               |
    /// | `WECOM_CORP_ID` / `WECOM_CORP_SECRET` | unset (WeCom disabled)   |
    /// | `WECOM_BASE_URL`              | `https://qyapi.weixin.qq.com`    |
    /// | `WECOM_ROOT_DEPARTMENT_ID`    | `1`                              |
    /// | `SYNC_ENABLED`                | `true`                           |
    /// | `SYNC_DAILY_HOUR`             | `2`                              |
    /// | `SYNC_UTC_OFFSET_HOURS`       | `8`                              |
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3100".into()),
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/storelife".into()),
            redis_url: var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
            jwt_secret: resolve_jwt_secret(),
            access_token_ttl_secs: parse_or(
                "ACCESS_TOKEN_TTL_SECS",
                var("ACCESS_TOKEN_TTL_SECS"),
                DEFAULT_ACCESS_TOKEN_TTL_SECS,
            ),
            refresh_token_ttl_secs: parse_or(
                "REFRESH_TOKEN_TTL_SECS",
                var("REFRESH_TOKEN_TTL_SECS"),
                DEFAULT_REFRESH_TOKEN_TTL_SECS,
            ),
            session_idle_timeout_secs: parse_or(
                "SESSION_IDLE_TIMEOUT_SECS",
                var("SESSION_IDLE_TIMEOUT_SECS"),
                DEFAULT_IDLE_TIMEOUT_SECS,
            ),
            session_sweep_interval_secs: parse_or(
                "SESSION_SWEEP_INTERVAL_SECS",
                var("SESSION_SWEEP_INTERVAL_SECS"),
                DEFAULT_SWEEP_INTERVAL_SECS,
            ),
            wecom: wecom_settings(
                var("WECOM_CORP_ID"),
                var("WECOM_CORP_SECRET"),
                var("WECOM_BASE_URL"),
                var("WECOM_ROOT_DEPARTMENT_ID"),
            ),
            sync_enabled: parse_or("SYNC_ENABLED", var("SYNC_ENABLED"), true),
            sync_daily_hour: parse_or("SYNC_DAILY_HOUR", var("SYNC_DAILY_HOUR"), DEFAULT_DAILY_HOUR),
            sync_utc_offset_hours: parse_or(
                "SYNC_UTC_OFFSET_HOURS",
                var("SYNC_UTC_OFFSET_HOURS"),
                DEFAULT_UTC_OFFSET_HOURS,
            ),
        }
    }

    /// Configuration for tests and local tooling: no external services.
    pub fn for_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            database_url: String::new(),
            redis_url: String::new(),
            jwt_secret: jwt_secret.into(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            session_idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            session_sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            wecom: None,
            sync_enabled: false,
            sync_daily_hour: DEFAULT_DAILY_HOUR,
            sync_utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
        }
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            secret: self.jwt_secret.clone(),
            access_ttl_secs: self.access_token_ttl_secs,
            refresh_ttl_secs: self.refresh_token_ttl_secs,
            idle_timeout_secs: self.session_idle_timeout_secs,
        }
    }
}

fn parse_or<T: FromStr>(name: &str, value: Option<String>, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(name, value = %raw, "ignoring unparseable setting, using default");
            default
        }),
    }
}

fn wecom_settings(
    corp_id: Option<String>,
    corp_secret: Option<String>,
    base_url: Option<String>,
    root_department_id: Option<String>,
) -> Option<WeComSettings> {
    let corp_id = corp_id.filter(|v| !v.is_empty())?;
    let corp_secret = corp_secret.filter(|v| !v.is_empty())?;
    Some(WeComSettings {
        corp_id,
        corp_secret,
        base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()),
        root_department_id: root_department_id.unwrap_or_else(|| "1".into()),
    })
}
