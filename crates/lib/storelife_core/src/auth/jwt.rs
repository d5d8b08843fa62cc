//! JWT token generation and verification.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{TokenClaims, TokenType, UserAccount};

/// Clock skew tolerated when checking `exp`.
const EXPIRY_LEEWAY_SECS: u64 = 5;

/// Sign a token of the given type for `user`, valid for `ttl_secs`.
pub fn generate_token(
    user: &UserAccount,
    token_type: TokenType,
    ttl_secs: i64,
    secret: &[u8],
) -> Result<(String, TokenClaims), AuthError> {
    let now = Utc::now();
    let claims = TokenClaims {
        sub: user.id.clone(),
        username: user.username.clone(),
        roles: user.roles.clone(),
        token_type,
        jti: Uuid::new_v4().to_string(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        iat: now.timestamp(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))?;
    Ok((token, claims))
}

/// Verify signature and expiry, returning the claims.
pub fn decode_token(token: &str, secret: &[u8]) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::default();
    validation.leeway = EXPIRY_LEEWAY_SECS;
    decode::<TokenClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
}

/// Verify the signature only. Used by logout, which must accept expired tokens.
pub fn decode_token_ignoring_expiry(token: &str, secret: &[u8]) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = false;
    decode::<TokenClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidToken)
}

/// SHA-256 hash a token for storage. Raw tokens are never persisted.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    for var in ["JWT_SECRET", "AUTH_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storelife")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn user() -> UserAccount {
        UserAccount {
            id: "u-1".into(),
            username: "alice".into(),
            display_name: "Alice".into(),
            external_id: None,
            department_ids: vec![],
            roles: vec!["admin".into()],
            is_active: true,
        }
    }

    #[test]
    fn generated_token_decodes_to_same_claims() {
        let (token, claims) = generate_token(&user(), TokenType::Access, 60, SECRET).unwrap();
        let decoded = decode_token(&token, SECRET).unwrap();
        assert_eq!(decoded.sub, "u-1");
        assert_eq!(decoded.username, "alice");
        assert_eq!(decoded.token_type, TokenType::Access);
        assert_eq!(decoded.jti, claims.jti);
    }

    #[test]
    fn tokens_issued_together_differ() {
        let (a, _) = generate_token(&user(), TokenType::Access, 60, SECRET).unwrap();
        let (b, _) = generate_token(&user(), TokenType::Access, 60, SECRET).unwrap();
        assert_ne!(hash_token(&a), hash_token(&b));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let (token, _) = generate_token(&user(), TokenType::Access, 60, SECRET).unwrap();
        assert!(matches!(
            decode_token(&token, b"other-secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(
            decode_token("not-a-jwt", SECRET),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn past_expiry_is_expired() {
        let (token, _) = generate_token(&user(), TokenType::Access, -3600, SECRET).unwrap();
        assert!(matches!(
            decode_token(&token, SECRET),
            Err(AuthError::TokenExpired)
        ));
        // Logout path still accepts it.
        let claims = decode_token_ignoring_expiry(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "u-1");
    }

    #[test]
    fn hash_is_hex_sha256() {
        let h = hash_token("abc");
        assert_eq!(h.len(), 64);
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
