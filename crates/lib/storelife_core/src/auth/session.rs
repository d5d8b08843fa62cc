//! Credential/session manager.
//!
//! The cached session record is the single source of truth for "is this user
//! logged in". A structurally valid token whose session is missing (deleted by
//! logout, idle timeout, or an administrator) is rejected. Protected-route
//! checks consult, in order: signature/expiry, session presence, the session's
//! current access-token hash, the blacklist, and the idle threshold.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use super::AuthError;
use super::jwt::{decode_token, decode_token_ignoring_expiry, generate_token, hash_token};
use super::store::SessionStore;
use crate::directory::store::DirectoryStore;
use crate::models::auth::{Principal, Session, TokenPair, TokenType, UserAccount};

/// Access token lifetime default: 7 days.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Refresh token lifetime default: 30 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Inactivity threshold default: 24 hours.
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 24 * 60 * 60;

/// Signing secret and lifetimes.
#[derive(Clone, Debug)]
pub struct TokenSettings {
    pub secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub idle_timeout_secs: i64,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }
}

/// Issues, verifies, refreshes, and revokes token pairs.
///
/// Constructed once at startup and shared through the application state.
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn DirectoryStore>,
    settings: TokenSettings,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn DirectoryStore>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            sessions,
            users,
            settings,
        }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Underlying cache, exposed for health checks.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Sign a fresh access/refresh pair and overwrite the user's session.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn issue(&self, user: &UserAccount) -> Result<TokenPair, AuthError> {
        let secret = self.settings.secret.as_bytes();
        let (access_token, _) =
            generate_token(user, TokenType::Access, self.settings.access_ttl_secs, secret)?;
        let (refresh_token, _) =
            generate_token(user, TokenType::Refresh, self.settings.refresh_ttl_secs, secret)?;

        let now = Utc::now();
        let session = Session {
            user_id: user.id.clone(),
            access_token_hash: hash_token(&access_token),
            refresh_token_hash: hash_token(&refresh_token),
            last_activity: now,
            created_at: now,
        };
        self.sessions
            .put_session(&session, self.remaining_ttl(&session, now))
            .await?;
        info!(username = %user.username, "session issued");

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.settings.access_ttl_secs,
        })
    }

    /// Resolve an access token to the principal it authenticates.
    pub async fn verify(&self, access_token: &str) -> Result<Principal, AuthError> {
        let claims = decode_token(access_token, self.settings.secret.as_bytes())?;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidToken);
        }

        let token_hash = hash_token(access_token);
        let session = self
            .sessions
            .get_session(&claims.sub)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        if session.access_token_hash != token_hash {
            return Err(AuthError::SessionNotFound);
        }
        if self.sessions.is_blacklisted(&token_hash).await? {
            return Err(AuthError::TokenRevoked);
        }
        if self.is_idle(&session, Utc::now()) {
            self.sessions
                .delete_session_if(&claims.sub, &token_hash)
                .await?;
            info!(user_id = %claims.sub, "session idle timeout");
            return Err(AuthError::SessionTimeout);
        }

        Ok(Principal {
            user_id: claims.sub,
            username: claims.username,
            roles: claims.roles,
            is_authenticated: true,
        })
    }

    /// Exchange a refresh token for a new pair (single use).
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = decode_token(refresh_token, self.settings.secret.as_bytes())
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidRefreshToken);
        }

        let session = match self.sessions.get_session(&claims.sub).await? {
            Some(s) if s.refresh_token_hash == hash_token(refresh_token) => s,
            _ => {
                debug!(user_id = %claims.sub, "refresh token does not match a live session");
                return Err(AuthError::InvalidRefreshToken);
            }
        };
        if self.is_idle(&session, Utc::now()) {
            self.sessions
                .delete_session_if(&claims.sub, &session.access_token_hash)
                .await?;
            return Err(AuthError::InvalidRefreshToken);
        }

        let user = self
            .users
            .find_user_by_id(&claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::InvalidRefreshToken)?;

        self.issue(&user).await
    }

    /// Best-effort logout. Never fails from the caller's perspective.
    pub async fn logout(&self, access_token: &str) {
        match self.revoke(access_token).await {
            Ok(()) => {}
            Err(AuthError::InvalidToken) => debug!("logout with unverifiable token ignored"),
            Err(e) => warn!(error = %e, "logout cleanup failed"),
        }
    }

    async fn revoke(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = decode_token_ignoring_expiry(access_token, self.settings.secret.as_bytes())?;
        let token_hash = hash_token(access_token);

        // A newer login for the same user stays intact.
        self.sessions
            .delete_session_if(&claims.sub, &token_hash)
            .await?;

        let remaining = claims.exp - Utc::now().timestamp();
        if remaining > 0 {
            self.sessions
                .blacklist(&token_hash, Duration::from_secs(remaining as u64))
                .await?;
        }
        info!(user_id = %claims.sub, "logged out");
        Ok(())
    }

    /// Record activity for the idle-timeout policy. No-op without a session.
    pub async fn touch_activity(&self, user_id: &str) -> Result<(), AuthError> {
        self.sessions.touch_session(user_id, Utc::now()).await?;
        Ok(())
    }

    /// Delete the session if it has been idle past the threshold.
    ///
    /// Returns `true` when a session was removed.
    pub async fn check_idle_timeout(&self, user_id: &str) -> Result<bool, AuthError> {
        match self.sessions.get_session(user_id).await? {
            Some(session) if self.is_idle(&session, Utc::now()) => {
                let removed = self
                    .sessions
                    .delete_session_if(user_id, &session.access_token_hash)
                    .await?;
                if removed {
                    info!(user_id, "session idle timeout");
                }
                Ok(removed)
            }
            _ => Ok(false),
        }
    }

    /// Run [`check_idle_timeout`](Self::check_idle_timeout) over every live
    /// session. Returns how many were removed.
    #[instrument(skip_all)]
    pub async fn sweep_idle_sessions(&self) -> Result<usize, AuthError> {
        let mut removed = 0;
        for user_id in self.sessions.session_user_ids().await? {
            match self.check_idle_timeout(&user_id).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(%user_id, error = %e, "idle check failed"),
            }
        }
        Ok(removed)
    }

    fn is_idle(&self, session: &Session, now: DateTime<Utc>) -> bool {
        (now - session.last_activity).num_seconds() > self.settings.idle_timeout_secs
    }

    /// Cache TTL: the session lives as long as its refresh token.
    fn remaining_ttl(&self, session: &Session, now: DateTime<Utc>) -> Duration {
        let elapsed = (now - session.created_at).num_seconds().max(0);
        let remaining = (self.settings.refresh_ttl_secs - elapsed).max(1);
        Duration::from_secs(remaining as u64)
    }
}
