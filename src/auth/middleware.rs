use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use sqlx::PgPool;

use crate::auth::token::{verify_claims_of_kind, TokenError, TokenKind};
use crate::config::Config;
use crate::error::AppError;
use crate::models::CurrentUser;

/// Resolves the Authorization header into a [`CurrentUser`] stored in
/// request extensions.
///
/// Two schemes are understood: `Token <key>` looks the opaque session key up
/// in the database, `Bearer <jwt>` verifies an access token and loads its
/// subject. A request without credentials passes through anonymously; the
/// per-route extractors decide whether that is acceptable.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    // Rc because the credential lookup awaits a database query, so the
    // future has to own a handle to the inner service.
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let header = req
                .headers()
                .get("Authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);

            if let Some(header) = header {
                match resolve_credential(&req, &header).await {
                    Ok(Some(user)) => {
                        req.extensions_mut().insert(user);
                    }
                    // Unknown scheme: treated as if no credentials were sent.
                    Ok(None) => {}
                    Err(app_err) => return Err(app_err.into()),
                }
            }

            service.call(req).await
        })
    }
}

async fn resolve_credential(
    req: &ServiceRequest,
    header: &str,
) -> Result<Option<CurrentUser>, AppError> {
    let resolved = if let Some(key) = header.strip_prefix("Token ") {
        let pool = request_pool(req)?;
        let user = CurrentUser::from_opaque_key(pool, key.trim())
            .await?
            .ok_or_else(|| AppError::Unauthenticated("Invalid token.".into()))?;
        Some(user)
    } else if let Some(raw) = header.strip_prefix("Bearer ") {
        let config = req
            .app_data::<web::Data<Config>>()
            .ok_or_else(|| AppError::Service("Application config is not available".into()))?;
        let claims = verify_claims_of_kind(raw.trim(), &config.jwt_secret, TokenKind::Access)
            .map_err(|e| match e {
                TokenError::Expired => AppError::Unauthenticated("token has been expired".into()),
                TokenError::Invalid => AppError::Unauthenticated("token is invalid".into()),
            })?;
        let pool = request_pool(req)?;
        let user = CurrentUser::from_user_id(pool, claims.user_id)
            .await?
            .ok_or_else(|| AppError::Unauthenticated("User not found".into()))?;
        Some(user)
    } else {
        None
    };

    if let Some(user) = &resolved {
        if !user.is_active {
            return Err(AppError::Unauthenticated("User account is disabled.".into()));
        }
    }

    Ok(resolved)
}

fn request_pool(req: &ServiceRequest) -> Result<&PgPool, AppError> {
    req.app_data::<web::Data<PgPool>>()
        .map(|data| data.get_ref())
        .ok_or_else(|| AppError::Service("Database pool is not available".into()))
}
