//! Request and response bodies. JSON field names are camelCase.

use serde::{Deserialize, Serialize};
use storelife_core::directory::sync::{SyncCounts, SyncKind, SyncReport};
use storelife_core::models::auth::{Principal, TokenPair, UserAccount};
use storelife_core::models::entity::EntityRecord;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub cache: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct WeComLoginRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub roles: Vec<String>,
}

impl From<&UserAccount> for AuthUser {
    fn from(user: &UserAccount) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            roles: user.roles.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
}

impl TokenResponse {
    pub fn new(pair: TokenPair, user: Option<AuthUser>) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            token_type: "Bearer".to_string(),
            user,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub username: String,
    pub roles: Vec<String>,
    pub is_admin: bool,
}

impl From<Principal> for MeResponse {
    fn from(p: Principal) -> Self {
        let is_admin = p.is_admin();
        Self {
            user_id: p.user_id,
            username: p.username,
            roles: p.roles,
            is_admin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct EntityListResponse {
    pub items: Vec<EntityRecord>,
}

#[derive(Debug, Serialize)]
pub struct TransitionsResponse {
    pub status: String,
    pub available: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    pub kind: Option<SyncKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub kind: SyncKind,
    pub success: bool,
    /// Milliseconds.
    pub duration: u64,
    pub counts: SyncCounts,
    pub errors: Vec<String>,
}

impl From<SyncReport> for SyncResponse {
    fn from(r: SyncReport) -> Self {
        Self {
            kind: r.kind,
            success: r.success,
            duration: r.duration_ms,
            counts: r.counts,
            errors: r.errors,
        }
    }
}
