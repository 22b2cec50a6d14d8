use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// What a JWT is allowed to be used for. A refresh token cannot authenticate
/// a request and a reset token cannot be refreshed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// The unique identifier of the account the token was issued for.
    pub user_id: i32,
    /// Expiration timestamp (seconds since epoch) for the token.
    pub exp: usize,
    /// The purpose this token may be used for.
    pub token_type: TokenKind,
    /// Unique token id, used to track single-use reset tokens.
    pub jti: String,
}

/// Why a token was rejected. Expiry is reported separately from every
/// other failure so callers can tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Invalid,
}

impl TokenError {
    pub fn message(&self) -> &'static str {
        match self {
            TokenError::Expired => "token has been expired",
            TokenError::Invalid => "token is invalid",
        }
    }
}

/// Signs a JWT for a given user ID.
///
/// # Arguments
/// * `user_id` - The ID of the account the token is issued for.
/// * `kind` - The purpose of the token, embedded as the `token_type` claim.
/// * `ttl_secs` - Seconds until the token expires.
/// * `secret` - The HS256 signing secret.
///
/// # Returns
/// A `Result` containing the JWT string if successful.
/// Returns `AppError::Service` if encoding fails.
pub fn issue_claims(
    user_id: i32,
    kind: TokenKind,
    ttl_secs: i64,
    secret: &str,
) -> Result<String, AppError> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::seconds(ttl_secs))
        .ok_or_else(|| AppError::Service("token expiry out of range".into()))?
        .timestamp() as usize;

    let claims = Claims {
        user_id,
        exp: expiration,
        token_type: kind,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Service(format!("Failed to sign token: {}", e)))
}

/// Verifies a JWT string and decodes its claims.
///
/// Default validation checks are applied (signature, expiration). An expired
/// token yields `TokenError::Expired`; any other failure, including a missing
/// or unknown `token_type` claim, yields `TokenError::Invalid`.
pub fn verify_claims(token: &str, secret: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })
}

/// Verifies a JWT and additionally checks it was issued for `kind`.
/// A structurally valid token of the wrong kind is reported as invalid.
pub fn verify_claims_of_kind(
    token: &str,
    secret: &str,
    kind: TokenKind,
) -> Result<Claims, TokenError> {
    let claims = verify_claims(token, secret)?;
    if claims.token_type != kind {
        return Err(TokenError::Invalid);
    }
    Ok(claims)
}

/// Returns the opaque session token key for a user, creating one on first login.
/// Repeat logins hand back the same key until it is revoked.
pub async fn issue_opaque(pool: &PgPool, user_id: i32) -> Result<String, AppError> {
    let existing = sqlx::query_scalar::<_, String>("SELECT key FROM auth_tokens WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    if let Some(key) = existing {
        return Ok(key);
    }

    sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(generate_key())
        .bind(user_id)
        .execute(pool)
        .await?;

    // Re-read instead of returning the generated key, in case a concurrent
    // login won the insert.
    let key = sqlx::query_scalar::<_, String>("SELECT key FROM auth_tokens WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(key)
}

/// Deletes the user's opaque session token. Returns whether one existed.
pub async fn revoke_opaque(pool: &PgPool, user_id: i32) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn generate_key() -> String {
    // Two simple UUIDs give a 64 hex character key.
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// In-memory record of consumed password reset tokens.
///
/// A reset token works exactly once; attempts to replay it are rejected even
/// inside its expiry window. Entries are pruned once the underlying token has
/// expired anyway, so the map stays bounded by the reset timeout.
#[derive(Debug, Default)]
pub struct UsedTokenStore {
    entries: Mutex<HashMap<String, i64>>,
}

impl UsedTokenStore {
    pub fn is_used(&self, jti: &str) -> bool {
        let now = Utc::now().timestamp();
        let entries = self.entries.lock().unwrap();
        entries.get(jti).map(|exp| *exp > now).unwrap_or(false)
    }

    pub fn mark_used(&self, jti: &str, exp: i64) {
        let now = Utc::now().timestamp();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, e| *e > now);
        entries.insert(jti.to_string(), exp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_for_claims";

    #[test]
    fn test_token_generation_and_verification() {
        let token = issue_claims(1, TokenKind::Access, 3600, SECRET).unwrap();
        let claims = verify_claims(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, 1);
        assert_eq!(claims.token_type, TokenKind::Access);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_each_token_gets_a_fresh_jti() {
        let first = issue_claims(1, TokenKind::Reset, 3600, SECRET).unwrap();
        let second = issue_claims(1, TokenKind::Reset, 3600, SECRET).unwrap();
        let first_claims = verify_claims(&first, SECRET).unwrap();
        let second_claims = verify_claims(&second, SECRET).unwrap();
        assert_ne!(first_claims.jti, second_claims.jti);
    }

    #[test]
    fn test_token_expiration() {
        // Expired well past the default validation leeway.
        let token = issue_claims(2, TokenKind::Access, -7200, SECRET).unwrap();
        assert_eq!(verify_claims(&token, SECRET), Err(TokenError::Expired));
    }

    #[test]
    fn test_invalid_token_signature() {
        let token = issue_claims(3, TokenKind::Access, 3600, SECRET).unwrap();
        assert_eq!(
            verify_claims(&token, "a_completely_different_secret"),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        assert_eq!(
            verify_claims("not-even-a-jwt", SECRET),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_foreign_token_without_kind_claim_is_invalid() {
        // Signed with the right secret but missing token_type and jti.
        #[derive(serde::Serialize)]
        struct BareClaims {
            user_id: i32,
            exp: usize,
        }
        let exp = (Utc::now().timestamp() + 3600) as usize;
        let token = encode(
            &Header::default(),
            &BareClaims { user_id: 4, exp },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(verify_claims(&token, SECRET), Err(TokenError::Invalid));
    }

    #[test]
    fn test_kind_mismatch_is_invalid() {
        let refresh = issue_claims(5, TokenKind::Refresh, 3600, SECRET).unwrap();
        assert!(verify_claims_of_kind(&refresh, SECRET, TokenKind::Refresh).is_ok());
        assert_eq!(
            verify_claims_of_kind(&refresh, SECRET, TokenKind::Access),
            Err(TokenError::Invalid)
        );
        assert_eq!(
            verify_claims_of_kind(&refresh, SECRET, TokenKind::Reset),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_used_token_store_blocks_replay() {
        let store = UsedTokenStore::default();
        let exp = Utc::now().timestamp() + 3600;

        assert!(!store.is_used("jti-1"));
        store.mark_used("jti-1", exp);
        assert!(store.is_used("jti-1"));
        assert!(!store.is_used("jti-2"));
    }

    #[test]
    fn test_used_token_store_prunes_expired_entries() {
        let store = UsedTokenStore::default();
        // Already expired; the store has no reason to remember it.
        store.mark_used("stale", Utc::now().timestamp() - 10);
        assert!(!store.is_used("stale"));
    }
}
