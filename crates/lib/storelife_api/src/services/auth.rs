//! Authentication service: password and WeCom login flows on top of
//! `storelife_core::auth`.

use storelife_core::auth::password::password_matches;
use storelife_core::auth::{AuthError, SessionManager};
use storelife_core::directory::store::DirectoryStore;
use storelife_core::directory::{DirectoryError, DirectorySource};
use storelife_core::models::auth::UserAccount;
use tracing::{info, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::models::{AuthUser, TokenResponse};

async fn issue_for(sessions: &SessionManager, user: &UserAccount) -> AppResult<TokenResponse> {
    let pair = sessions.issue(user).await?;
    Ok(TokenResponse::new(pair, Some(AuthUser::from(user))))
}

/// Authenticate with username + password.
///
/// Unknown users, inactive users, accounts without a local password and
/// wrong passwords all fail the same way.
#[instrument(skip(sessions, users, password))]
pub async fn login(
    sessions: &SessionManager,
    users: &dyn DirectoryStore,
    username: &str,
    password: &str,
) -> AppResult<TokenResponse> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation("username and password are required".into()));
    }

    let Some(found) = users.find_user_by_username(username).await? else {
        return Err(AuthError::InvalidCredentials.into());
    };
    let valid = found.user.is_active
        && found
            .password_hash
            .as_deref()
            .is_some_and(|hash| password_matches(password, hash));
    if !valid {
        info!("password login rejected");
        return Err(AuthError::InvalidCredentials.into());
    }

    issue_for(sessions, &found.user).await
}

/// Authenticate with a WeCom OAuth code.
#[instrument(skip_all)]
pub async fn wecom_login(
    sessions: &SessionManager,
    users: &dyn DirectoryStore,
    directory: Option<&dyn DirectorySource>,
    code: &str,
) -> AppResult<TokenResponse> {
    if code.trim().is_empty() {
        return Err(AppError::Validation("code is required".into()));
    }
    let directory = directory.ok_or_else(|| {
        AppError::ExternalServiceUnavailable("WeCom integration is not configured".into())
    })?;

    let external_id = match directory.user_id_by_code(code).await {
        Ok(id) => id,
        Err(DirectoryError::Api { code, message }) => {
            warn!(code, %message, "WeCom rejected OAuth code");
            return Err(AuthError::InvalidCredentials.into());
        }
        Err(e) => return Err(e.into()),
    };

    let user = users
        .find_user_by_external_id(&external_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| {
            info!(%external_id, "WeCom user has no active local account");
            AppError::from(AuthError::InvalidCredentials)
        })?;

    issue_for(sessions, &user).await
}

/// Rotate a refresh token.
pub async fn refresh(sessions: &SessionManager, refresh_token: &str) -> AppResult<TokenResponse> {
    let pair = sessions.refresh(refresh_token).await?;
    Ok(TokenResponse::new(pair, None))
}
