pub mod extractors;
pub mod middleware;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// Re-export necessary items
pub use extractors::{Anonymous, AuthUser, MaybeUser};
pub use middleware::AuthMiddleware;
pub use password::{hash_password, verify_password};
pub use token::{
    issue_claims, issue_opaque, revoke_opaque, verify_claims, verify_claims_of_kind, Claims,
    TokenError, TokenKind, UsedTokenStore,
};

lazy_static! {
    // Passwords made of digits only are rejected.
    static ref NUMERIC_ONLY_REGEX: regex::Regex = regex::Regex::new(r"^\d+$").unwrap();
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if NUMERIC_ONLY_REGEX.is_match(password) {
        let mut error = ValidationError::new("entirely_numeric");
        error.message = Some("password cannot be entirely numeric".into());
        return Err(error);
    }
    Ok(())
}

/// Represents the payload for a login request, both for opaque session
/// tokens and for JWT pairs.
///
/// The `email` field also accepts a username; lookup matches either column.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Represents the payload for a new user registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address for the new account.
    /// Must be a valid email format.
    #[validate(email)]
    pub email: String,
    /// Password for the new account.
    /// Must be 8 to 100 characters and not entirely numeric.
    #[validate(
        length(min = 8, max = 100),
        custom = "validate_password_strength",
        must_match(other = "password_confirm", message = "password fields do not match")
    )]
    pub password: String,
    /// Must repeat `password` exactly.
    pub password_confirm: String,
}

/// Payload for changing the password of an authenticated user.
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(
        length(min = 8, max = 100),
        custom = "validate_password_strength",
        must_match(other = "new_password_confirm", message = "password fields do not match")
    )]
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Payload for requesting a password reset email.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequest {
    #[validate(email)]
    pub email: String,
}

/// Payload for completing a password reset with the emailed token.
#[derive(Debug, Deserialize, Validate)]
pub struct ResetConfirmRequest {
    #[validate(
        length(min = 8, max = 100),
        custom = "validate_password_strength",
        must_match(other = "new_password_confirm", message = "password fields do not match")
    )]
    pub new_password: String,
    pub new_password_confirm: String,
}

/// Payload for requesting a fresh activation email.
#[derive(Debug, Deserialize, Validate)]
pub struct ResendActivationRequest {
    #[validate(email)]
    pub email: String,
}

/// Payload carrying a refresh token.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Payload carrying an arbitrary JWT to check.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

/// Response structure after a successful opaque-token login.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenLoginResponse {
    /// The opaque session token key.
    pub token: String,
    /// The unique identifier of the authenticated user.
    pub user_id: i32,
    /// The email the account was registered with.
    pub email: String,
}

/// Response structure after a successful JWT login.
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtPair {
    pub access: String,
    pub refresh: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_login_request_validation() {
        let valid_login = LoginRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid_login.validate().is_ok());

        // A username handle is accepted in the email field.
        let username_login = LoginRequest {
            email: "some_user".to_string(),
            password: "password123".to_string(),
        };
        assert!(username_login.validate().is_ok());

        let empty_password_login = LoginRequest {
            email: "test@example.com".to_string(),
            password: "".to_string(),
        };
        assert!(empty_password_login.validate().is_err());
    }

    #[test]
    fn test_register_request_validation() {
        let valid_register = RegisterRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
            password_confirm: "password123".to_string(),
        };
        assert!(valid_register.validate().is_ok());

        let invalid_email_register = RegisterRequest {
            email: "testexample.com".to_string(),
            password: "password123".to_string(),
            password_confirm: "password123".to_string(),
        };
        assert!(invalid_email_register.validate().is_err());

        let short_password_register = RegisterRequest {
            email: "test@example.com".to_string(),
            password: "short".to_string(),
            password_confirm: "short".to_string(),
        };
        assert!(short_password_register.validate().is_err());
    }

    #[test]
    fn test_register_rejects_numeric_password() {
        let numeric_register = RegisterRequest {
            email: "test@example.com".to_string(),
            password: "1234567890".to_string(),
            password_confirm: "1234567890".to_string(),
        };
        assert!(numeric_register.validate().is_err());
    }

    #[test]
    fn test_register_rejects_mismatched_confirmation() {
        let mismatched = RegisterRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
            password_confirm: "password124".to_string(),
        };
        assert!(mismatched.validate().is_err());
    }

    #[test]
    fn test_change_password_validation() {
        let valid = ChangePasswordRequest {
            old_password: "old-password".to_string(),
            new_password: "new-password1".to_string(),
            new_password_confirm: "new-password1".to_string(),
        };
        assert!(valid.validate().is_ok());

        let mismatched = ChangePasswordRequest {
            old_password: "old-password".to_string(),
            new_password: "new-password1".to_string(),
            new_password_confirm: "something-else".to_string(),
        };
        assert!(mismatched.validate().is_err());
    }

    #[test]
    fn test_password_strength_checker() {
        assert!(validate_password_strength("123abc456").is_ok());
        assert!(validate_password_strength("00001111").is_err());
    }
}
