use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::AppError;

/// A full account row. Never serialized directly so the password hash
/// cannot leak into a response body.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

const USER_COLUMNS: &str =
    "id, email, username, password_hash, is_active, is_verified, is_staff, is_superuser";

impl User {
    /// Looks an account up by email or username with a single parameter,
    /// so the login form accepts either.
    pub async fn find_by_login(pool: &PgPool, handle: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1 OR username = $1",
            USER_COLUMNS
        ))
        .bind(handle)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    pub async fn set_password_hash(pool: &PgPool, id: i32, hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(hash)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// The public identity attached to an account. Tasks are owned by profiles,
/// not by accounts, so account internals stay out of task payloads.
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: i32,
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub description: String,
}

impl Profile {
    pub async fn for_user(pool: &PgPool, user_id: i32) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, user_id, first_name, last_name, description
             FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(profile)
    }
}

/// Input structure for updating the caller's profile.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(max = 255))]
    pub first_name: String,
    #[validate(length(max = 255))]
    pub last_name: String,
    #[validate(length(max = 1000))]
    pub description: String,
}

/// The resolved identity the auth middleware stores on a request.
/// Joins the account and its profile so handlers get both ids in one lookup.
#[derive(Debug, Clone, FromRow)]
pub struct CurrentUser {
    pub user_id: i32,
    pub profile_id: i32,
    pub email: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_staff: bool,
}

const CURRENT_USER_COLUMNS: &str = "u.id AS user_id, p.id AS profile_id, u.email, \
     u.is_active, u.is_verified, u.is_staff";

impl CurrentUser {
    /// Resolves an opaque session token key to its owner.
    pub async fn from_opaque_key(pool: &PgPool, key: &str) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, CurrentUser>(&format!(
            "SELECT {} FROM auth_tokens t
             JOIN users u ON u.id = t.user_id
             JOIN profiles p ON p.user_id = u.id
             WHERE t.key = $1",
            CURRENT_USER_COLUMNS
        ))
        .bind(key)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }

    /// Resolves the subject of a verified JWT.
    pub async fn from_user_id(pool: &PgPool, user_id: i32) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, CurrentUser>(&format!(
            "SELECT {} FROM users u
             JOIN profiles p ON p.user_id = u.id
             WHERE u.id = $1",
            CURRENT_USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_validation() {
        // Test valid input
        let input = ProfileUpdate {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            description: "First programmer".to_string(),
        };
        assert!(input.validate().is_ok());

        // Empty fields are allowed, the profile starts out blank
        let input = ProfileUpdate {
            first_name: String::new(),
            last_name: String::new(),
            description: String::new(),
        };
        assert!(input.validate().is_ok());

        // Test oversized name
        let input = ProfileUpdate {
            first_name: "a".repeat(256),
            last_name: "Lovelace".to_string(),
            description: String::new(),
        };
        assert!(input.validate().is_err());
    }
}
