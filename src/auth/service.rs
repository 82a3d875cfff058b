//! Token-to-user resolution

use sqlx::PgPool;
use thiserror::Error;

use crate::models::User;

use super::jwt::{verify_token, JwtError};

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Expected access token")]
    WrongTokenType,

    #[error("User not found")]
    UserNotFound,

    #[error("User account is disabled")]
    UserInactive,
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        AuthError::DatabaseError(e.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::TokenExpired => AuthError::TokenExpired,
            other => AuthError::TokenError(other.to_string()),
        }
    }
}

/// Resolves bearer tokens into active user records
#[derive(Clone)]
pub struct Authenticator {
    db_pool: PgPool,
    jwt_secret: String,
}

impl Authenticator {
    pub fn new(db_pool: PgPool, jwt_secret: String) -> Self {
        Self {
            db_pool,
            jwt_secret,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Verify an access token and load its user
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = verify_token(token, &self.jwt_secret)?;

        if claims.token_type != "access" {
            return Err(AuthError::WrongTokenType);
        }

        let user_id = claims.user_id()?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            return Err(AuthError::UserInactive);
        }

        Ok(user)
    }
}
