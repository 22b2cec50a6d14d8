use actix_web::{get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    auth::{
        hash_password, issue_claims, issue_opaque, revoke_opaque, verify_claims,
        verify_claims_of_kind, verify_password, Anonymous, AuthUser, ChangePasswordRequest,
        JwtPair, LoginRequest, RefreshRequest, RegisterRequest, ResendActivationRequest,
        ResetConfirmRequest, ResetRequest, TokenKind, TokenLoginResponse, UsedTokenStore,
        VerifyRequest,
    },
    config::Config,
    error::AppError,
    mailer::{self, Mailer},
    models::{Profile, ProfileUpdate, User},
};

/// Register a new account
///
/// Creates an unverified user with an attached profile and emails an
/// activation link. The account cannot obtain JWTs until it is activated.
#[post("/registration/")]
pub async fn registration(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    // Validate input
    register_data.validate()?;

    // Check if email already exists
    let existing = sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE email = $1")
        .bind(&register_data.email)
        .fetch_optional(&**pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::Validation("Email already registered".into()));
    }

    // Hash password
    let password_hash = hash_password(&register_data.password)?;

    // The user and its profile appear together or not at all.
    let mut tx = pool.begin().await?;
    let user_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id",
    )
    .bind(&register_data.email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await?;
    sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    let token = issue_claims(
        user_id,
        TokenKind::Access,
        config.access_token_lifetime,
        &config.jwt_secret,
    )?;
    let (subject, body) = mailer::activation_message(&config.public_base_url, &token);
    mailer::dispatch(
        mailer.into_inner(),
        register_data.email.clone(),
        subject,
        body,
    );

    Ok(HttpResponse::Created().json(json!({ "email": register_data.email })))
}

/// Log in for an opaque session token
///
/// Returns the user's persistent token key, creating it on first login.
/// Unverified accounts may log in here; only the JWT flow insists on
/// activation.
#[post("/token/login/")]
pub async fn token_login(
    pool: web::Data<PgPool>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let user = User::find_by_login(&pool, &login_data.email)
        .await?
        .ok_or_else(bad_credentials)?;
    if !verify_password(&login_data.password, &user.password_hash)? || !user.is_active {
        return Err(bad_credentials());
    }

    let token = issue_opaque(&pool, user.id).await?;

    Ok(HttpResponse::Ok().json(TokenLoginResponse {
        token,
        user_id: user.id,
        email: user.email,
    }))
}

fn bad_credentials() -> AppError {
    // One message for every failure mode, so the endpoint does not reveal
    // which part of the credentials was wrong.
    AppError::Validation("Unable to log in with provided credentials.".into())
}

/// Log out
///
/// Discards the caller's opaque session token. The same key stops working
/// everywhere immediately.
#[post("/token/logout/")]
pub async fn token_logout(
    pool: web::Data<PgPool>,
    user: AuthUser,
) -> Result<impl Responder, AppError> {
    let revoked = revoke_opaque(&pool, user.0.user_id).await?;
    if !revoked {
        return Err(AppError::Unauthenticated(
            "No active session token for this user.".into(),
        ));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// Obtain a JWT pair
///
/// Issues an access and a refresh token. Only active, verified accounts
/// qualify; an unverified account is told so explicitly.
#[post("/jwt/create/")]
pub async fn jwt_create(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;

    let no_account =
        || AppError::Unauthenticated("No active account found with the given credentials".into());

    let user = User::find_by_login(&pool, &login_data.email)
        .await?
        .ok_or_else(no_account)?;
    if !verify_password(&login_data.password, &user.password_hash)? || !user.is_active {
        return Err(no_account());
    }
    if !user.is_verified {
        return Err(AppError::Validation("user is not verified".into()));
    }

    let access = issue_claims(
        user.id,
        TokenKind::Access,
        config.access_token_lifetime,
        &config.jwt_secret,
    )?;
    let refresh = issue_claims(
        user.id,
        TokenKind::Refresh,
        config.refresh_token_lifetime,
        &config.jwt_secret,
    )?;

    Ok(HttpResponse::Ok().json(JwtPair { access, refresh }))
}

/// Exchange a refresh token for a fresh access token
#[post("/jwt/refresh/")]
pub async fn jwt_refresh(
    config: web::Data<Config>,
    refresh_data: web::Json<RefreshRequest>,
) -> Result<impl Responder, AppError> {
    let claims = verify_claims_of_kind(
        &refresh_data.refresh,
        &config.jwt_secret,
        TokenKind::Refresh,
    )
    .map_err(|e| AppError::Unauthenticated(e.message().into()))?;

    let access = issue_claims(
        claims.user_id,
        TokenKind::Access,
        config.access_token_lifetime,
        &config.jwt_secret,
    )?;

    Ok(HttpResponse::Ok().json(json!({ "access": access })))
}

/// Check a JWT
///
/// Returns an empty object if the token is well formed, correctly signed
/// and not expired, regardless of its kind.
#[post("/jwt/verify/")]
pub async fn jwt_verify(
    config: web::Data<Config>,
    verify_data: web::Json<VerifyRequest>,
) -> Result<impl Responder, AppError> {
    verify_claims(&verify_data.token, &config.jwt_secret)
        .map_err(|e| AppError::Unauthenticated(e.message().into()))?;
    Ok(HttpResponse::Ok().json(json!({})))
}

/// Change the caller's password
///
/// The old password must check out before the new one is accepted.
#[put("/change-password/")]
pub async fn change_password(
    pool: web::Data<PgPool>,
    user: AuthUser,
    change_data: web::Json<ChangePasswordRequest>,
) -> Result<impl Responder, AppError> {
    change_data.validate()?;

    let account = User::find_by_id(&pool, user.0.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if !verify_password(&change_data.old_password, &account.password_hash)? {
        return Err(AppError::Validation("Wrong password.".into()));
    }

    let new_hash = hash_password(&change_data.new_password)?;
    User::set_password_hash(&pool, account.id, &new_hash).await?;

    Ok(HttpResponse::Ok().json(json!({ "detail": "password updated successfully" })))
}

/// Request a password reset email
///
/// Only for logged-out callers; an authenticated session has no business
/// driving the out-of-band reset flow.
#[post("/password-reset/")]
pub async fn reset_request(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
    _guard: Anonymous,
    reset_data: web::Json<ResetRequest>,
) -> Result<impl Responder, AppError> {
    reset_data.validate()?;

    let user = User::find_by_email(&pool, &reset_data.email)
        .await?
        .ok_or_else(|| AppError::Validation("there is no user with the provided email".into()))?;

    let token = issue_claims(
        user.id,
        TokenKind::Reset,
        config.password_reset_timeout,
        &config.jwt_secret,
    )?;
    let (subject, body) = mailer::reset_message(&config.public_base_url, &token);
    mailer::dispatch(mailer.into_inner(), user.email.clone(), subject, body);

    Ok(HttpResponse::Ok().json(json!({ "detail": "check your email to reset your password" })))
}

/// Complete a password reset
///
/// The token from the email is good for one successful reset. Replaying it
/// afterwards fails as invalid even inside its expiry window.
#[put("/password-reset/{token}")]
pub async fn reset_confirm(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    used_tokens: web::Data<UsedTokenStore>,
    _guard: Anonymous,
    token: web::Path<String>,
    reset_data: web::Json<ResetConfirmRequest>,
) -> Result<impl Responder, AppError> {
    let claims = verify_claims_of_kind(token.as_str(), &config.jwt_secret, TokenKind::Reset)
        .map_err(|e| AppError::Validation(e.message().into()))?;
    if used_tokens.is_used(&claims.jti) {
        return Err(AppError::Validation("token is invalid".into()));
    }

    reset_data.validate()?;

    let user = User::find_by_id(&pool, claims.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let new_hash = hash_password(&reset_data.new_password)?;
    User::set_password_hash(&pool, user.id, &new_hash).await?;

    // Consume only after the password actually changed, so a rejected
    // payload does not burn the token.
    used_tokens.mark_used(&claims.jti, claims.exp as i64);

    Ok(HttpResponse::Ok().json(json!({ "detail": "your password has been reset successfully" })))
}

/// Activate an account from the emailed link
///
/// Idempotent: hitting the link again after activation reports success
/// without touching the account.
#[get("/activation/confirm/{token}/")]
pub async fn activation_confirm(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    token: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let claims = verify_claims_of_kind(token.as_str(), &config.jwt_secret, TokenKind::Access)
        .map_err(|e| AppError::Validation(e.message().into()))?;

    let user = User::find_by_id(&pool, claims.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if user.is_verified {
        return Ok(
            HttpResponse::Ok().json(json!({ "detail": "your account has already been verified" }))
        );
    }

    sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = now() WHERE id = $1")
        .bind(user.id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "detail": "your account has been activated successfully" })))
}

/// Resend the activation email
#[post("/activation/resend/")]
pub async fn activation_resend(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    mailer: web::Data<Mailer>,
    resend_data: web::Json<ResendActivationRequest>,
) -> Result<impl Responder, AppError> {
    resend_data.validate()?;

    let user = User::find_by_email(&pool, &resend_data.email)
        .await?
        .ok_or_else(|| AppError::Validation("there is no user with the provided email".into()))?;
    if user.is_verified {
        return Err(AppError::Validation(
            "user is already activated and verified".into(),
        ));
    }

    let token = issue_claims(
        user.id,
        TokenKind::Access,
        config.access_token_lifetime,
        &config.jwt_secret,
    )?;
    let (subject, body) = mailer::activation_message(&config.public_base_url, &token);
    mailer::dispatch(mailer.into_inner(), user.email.clone(), subject, body);

    Ok(HttpResponse::Ok().json(json!({ "detail": "activation email resent successfully" })))
}

/// Read the caller's profile
#[get("/profile/")]
pub async fn profile_detail(
    pool: web::Data<PgPool>,
    user: AuthUser,
) -> Result<impl Responder, AppError> {
    let profile = Profile::for_user(&pool, user.0.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    Ok(HttpResponse::Ok().json(profile_body(&profile, &user.0.email)))
}

/// Update the caller's profile
///
/// The email is part of the account, not the profile, and stays read-only
/// here.
#[put("/profile/")]
pub async fn profile_update(
    pool: web::Data<PgPool>,
    user: AuthUser,
    profile_data: web::Json<ProfileUpdate>,
) -> Result<impl Responder, AppError> {
    profile_data.validate()?;

    let profile = sqlx::query_as::<_, Profile>(
        "UPDATE profiles
         SET first_name = $1, last_name = $2, description = $3, updated_at = now()
         WHERE user_id = $4
         RETURNING id, user_id, first_name, last_name, description",
    )
    .bind(&profile_data.first_name)
    .bind(&profile_data.last_name)
    .bind(&profile_data.description)
    .bind(user.0.user_id)
    .fetch_optional(&**pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Profile not found".into()))?;

    Ok(HttpResponse::Ok().json(profile_body(&profile, &user.0.email)))
}

fn profile_body(profile: &Profile, email: &str) -> serde_json::Value {
    json!({
        "id": profile.id,
        "user": profile.user_id,
        "email": email,
        "first_name": profile.first_name,
        "last_name": profile.last_name,
        "description": profile.description,
    })
}
