use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;
use crate::models::CurrentUser;

/// Extracts the authenticated identity from request extensions.
///
/// This extractor is intended for routes that require a logged-in caller.
/// `AuthMiddleware` validates the Authorization header and inserts the
/// resolved `CurrentUser` into request extensions; if nothing was inserted
/// the request carried no usable credentials and the route answers 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub CurrentUser);

impl FromRequest for AuthUser {
    type Error = ActixError; // AppError will be converted into ActixError via ResponseError
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<CurrentUser>().cloned() {
            Some(user) => ready(Ok(AuthUser(user))),
            None => {
                let err = AppError::Unauthenticated(
                    "Authentication credentials were not provided.".to_string(),
                );
                ready(Err(err.into())) // Convert AppError to ActixError
            }
        }
    }
}

/// Like [`AuthUser`] but optional. Routes that behave differently for
/// anonymous callers take this and branch on the inner `Option`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequest for MaybeUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(MaybeUser(req.extensions().get::<CurrentUser>().cloned())))
    }
}

/// The inverse gate: the route only makes sense for callers who are NOT
/// logged in, such as requesting a password reset. An authenticated request
/// is rejected with 403.
#[derive(Debug, Clone, Copy)]
pub struct Anonymous;

impl FromRequest for Anonymous {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        if req.extensions().get::<CurrentUser>().is_some() {
            let err = AppError::Forbidden(
                "You should be logged out to perform this action.".to_string(),
            );
            return ready(Err(err.into()));
        }
        ready(Ok(Anonymous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::dev::Payload;
    use actix_web::http::StatusCode;
    use actix_web::test;

    fn sample_identity() -> CurrentUser {
        CurrentUser {
            user_id: 123,
            profile_id: 456,
            email: "test@example.com".to_string(),
            is_active: true,
            is_verified: true,
            is_staff: false,
        }
    }

    #[actix_rt::test]
    async fn test_auth_user_extractor_success() {
        let req = test::TestRequest::default().to_http_request();
        req.extensions_mut().insert(sample_identity()); // HttpMessage trait brings .extensions_mut()

        let mut payload = Payload::None;
        let extracted = AuthUser::from_request(&req, &mut payload).await;
        assert!(extracted.is_ok());

        let user = extracted.unwrap().0;
        assert_eq!(user.user_id, 123);
        assert_eq!(user.profile_id, 456);
    }

    #[actix_rt::test]
    async fn test_auth_user_extractor_failure() {
        let req = test::TestRequest::default().to_http_request();
        // No identity inserted into extensions

        let mut payload = Payload::None;
        let extracted_result = AuthUser::from_request(&req, &mut payload).await;
        assert!(extracted_result.is_err());

        let err = extracted_result.unwrap_err();
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_maybe_user_extractor_is_infallible() {
        let req = test::TestRequest::default().to_http_request();
        let mut payload = Payload::None;

        let anonymous = MaybeUser::from_request(&req, &mut payload).await.unwrap();
        assert!(anonymous.0.is_none());

        req.extensions_mut().insert(sample_identity());
        let known = MaybeUser::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(known.0.unwrap().user_id, 123);
    }

    #[actix_rt::test]
    async fn test_anonymous_extractor_rejects_authenticated_caller() {
        let req = test::TestRequest::default().to_http_request();
        let mut payload = Payload::None;

        assert!(Anonymous::from_request(&req, &mut payload).await.is_ok());

        req.extensions_mut().insert(sample_identity());
        let rejected = Anonymous::from_request(&req, &mut payload).await;
        assert!(rejected.is_err());

        let response = rejected.unwrap_err().error_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
