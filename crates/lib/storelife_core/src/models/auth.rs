//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! types (which carry `#[serde(rename)]` for camelCase etc.).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role name granting access to privileged endpoints.
pub const ADMIN_ROLE: &str = "admin";

/// Local user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub display_name: String,
    /// WeCom userid when the account is mirrored from the directory.
    pub external_id: Option<String>,
    pub department_ids: Vec<String>,
    pub roles: Vec<String>,
    pub is_active: bool,
}

impl UserAccount {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }
}

/// User with password hash (for password login).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: UserAccount,
    pub password_hash: Option<String>,
}

/// Discriminates access tokens from refresh tokens inside the claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims embedded in both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — user ID (standard JWT `sub` claim).
    pub sub: String,
    pub username: String,
    pub roles: Vec<String>,
    pub token_type: TokenType,
    /// Unique token id, keeps tokens issued within the same second distinct.
    pub jti: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// Freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Server-side session record, one per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Identity resolved from a verified access token.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: String,
    pub username: String,
    pub roles: Vec<String>,
    pub is_authenticated: bool,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }
}
