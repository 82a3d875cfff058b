//! Authentication middleware
//!
//! Extractors that verify the bearer token, load the calling user and
//! enforce role requirements.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{AuthError as TokenAuthError, Authenticator};
use crate::models::User;
use crate::provider::ProviderService;

/// Authenticated user loaded from the bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Error response for authentication and role failures
#[derive(Debug, Serialize)]
struct AuthError {
    #[serde(skip)]
    status: StatusCode,
    error: AuthErrorDetails,
}

#[derive(Debug, Serialize)]
struct AuthErrorDetails {
    code: String,
    message: String,
}

impl AuthError {
    fn new(code: &str, message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: AuthErrorDetails {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    fn forbidden(message: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            ..Self::new("FORBIDDEN", message)
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Extractor for authenticated users
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(AuthenticatedUser(user): AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, {}", user.username)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthError::new(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                    .into_response()
                })?;

        let authenticator = Arc::<Authenticator>::from_ref(state);

        let user = authenticator
            .authenticate(bearer.token())
            .await
            .map_err(|e| {
                let (code, message) = match &e {
                    TokenAuthError::TokenExpired => ("TOKEN_EXPIRED", "Token has expired"),
                    TokenAuthError::WrongTokenType => ("INVALID_TOKEN_TYPE", "Expected access token"),
                    TokenAuthError::UserNotFound => ("USER_NOT_FOUND", "User not found"),
                    TokenAuthError::UserInactive => ("USER_INACTIVE", "User account is disabled"),
                    TokenAuthError::DatabaseError(_) => {
                        tracing::error!("Authentication lookup failed: {}", e);
                        ("AUTH_UNAVAILABLE", "Authentication is temporarily unavailable")
                    }
                    TokenAuthError::TokenError(_) => ("INVALID_TOKEN", "Invalid token"),
                };
                AuthError::new(code, message).into_response()
            })?;

        Ok(AuthenticatedUser(user))
    }
}

/// Staff or superuser
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::forbidden("Admin access required").into_response());
        }

        Ok(AdminUser(user))
    }
}

/// User with an active provider profile
pub struct ProviderUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for ProviderUser
where
    Arc<Authenticator>: FromRef<S>,
    Arc<ProviderService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !user.is_provider {
            return Err(AuthError::forbidden("Provider access required").into_response());
        }

        let providers = Arc::<ProviderService>::from_ref(state);
        providers
            .active_profile(user.id)
            .await
            .map_err(|e| {
                tracing::error!(user_id = user.id, "Provider profile lookup failed: {}", e);
                crate::error::ApiError::DatabaseError(e.to_string()).into_response()
            })?
            .ok_or_else(|| {
                AuthError::forbidden("Your provider account is inactive").into_response()
            })?;

        Ok(ProviderUser(user))
    }
}
