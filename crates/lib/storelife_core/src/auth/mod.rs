//! Authentication and session management.
//!
//! Provides password hashing, JWT issuance/verification, the server-side
//! session cache, and the token blacklist shared by every authenticated
//! request.

pub mod jwt;
pub mod password;
pub mod redis_store;
pub mod session;
pub mod store;
pub mod sweep;

use thiserror::Error;

use crate::error::StoreError;

pub use session::{SessionManager, TokenSettings};
pub use store::{MemorySessionStore, SessionStore};
pub use sweep::IdleSessionSweeper;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session timed out after inactivity")]
    SessionTimeout,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
