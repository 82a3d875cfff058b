//! Provider onboarding and moderation

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use validator::Validate;

use crate::error::ApiError;
use crate::models::User;
use crate::notification::{messages, Notifier, Outbox};

use super::model::{
    ApplicationStatus, ApplyRequest, DecideApplicationRequest, Decision, ProviderApplication,
    ProviderDetails,
};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0}")]
    NotFound(&'static str),

    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("This application has already been reviewed.")]
    AlreadyReviewed,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotFound(msg) => ApiError::NotFound(msg.to_string()),
            ProviderError::Validation { field, message } => ApiError::field(field, &message),
            ProviderError::AlreadyReviewed => ApiError::rule("APPLICATION_REVIEWED", e.to_string()),
            ProviderError::DatabaseError(db) => ApiError::DatabaseError(db.to_string()),
        }
    }
}

/// Provider service
#[derive(Clone)]
pub struct ProviderService {
    db_pool: PgPool,
    notifier: Arc<Notifier>,
}

impl ProviderService {
    pub fn new(db_pool: PgPool, notifier: Arc<Notifier>) -> Self {
        Self { db_pool, notifier }
    }

    /// Active provider profile for a user, if any
    pub async fn active_profile(&self, user_id: i64) -> Result<Option<ProviderDetails>, sqlx::Error> {
        sqlx::query_as::<_, ProviderDetails>(
            "SELECT * FROM provider_details WHERE user_id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await
    }

    /// Submit an application to become a provider
    pub async fn apply(&self, user: &User, request: ApplyRequest) -> Result<ProviderApplication, ProviderError> {
        for item in &request.services {
            if item.validate().is_err() {
                return Err(ProviderError::Validation {
                    field: "services",
                    message: "Experience must be between 0 and 60 years.".to_string(),
                });
            }
        }

        let service_ids: Vec<i64> = request.services.iter().map(|s| s.service).collect();
        let distinct: HashSet<i64> = service_ids.iter().copied().collect();
        if distinct.len() != service_ids.len() {
            return Err(ProviderError::Validation {
                field: "services",
                message: "Each service can only be listed once.".to_string(),
            });
        }

        let mut tx = self.db_pool.begin().await?;

        // Serializes concurrent applications by the same user.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        let already_provider: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM provider_details WHERE user_id = $1)",
        )
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await?;

        if already_provider && user.is_provider {
            return Err(ProviderError::Validation {
                field: "non_field_errors",
                message: "You are already a provider.".to_string(),
            });
        }

        let has_pending: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM provider_applications WHERE user_id = $1 AND status = 'pending')",
        )
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await?;

        if has_pending {
            return Err(ProviderError::Validation {
                field: "non_field_errors",
                message: "You already have a pending application.".to_string(),
            });
        }

        let known: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM services WHERE id = ANY($1) AND is_active = TRUE",
        )
        .bind(&service_ids)
        .fetch_one(&mut *tx)
        .await?;

        if known as usize != service_ids.len() {
            return Err(ProviderError::Validation {
                field: "services",
                message: "One or more selected services are invalid.".to_string(),
            });
        }

        let application = sqlx::query_as::<_, ProviderApplication>(
            "INSERT INTO provider_applications (user_id) VALUES ($1) RETURNING *",
        )
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await?;

        for item in &request.services {
            sqlx::query(
                r#"
                INSERT INTO provider_application_services
                    (application_id, service_id, price, experience_years)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(application.id)
            .bind(item.service)
            .bind(item.price)
            .bind(item.experience_years)
            .execute(&mut *tx)
            .await?;
        }

        let mut outbox = Outbox::new();
        outbox.push(messages::application_submitted(application.id, user.id, None));

        tx.commit().await?;
        tracing::info!(
            application_id = application.id,
            user_id = user.id,
            services = service_ids.len(),
            "Provider application submitted"
        );
        self.notifier.dispatch_all(outbox).await;

        Ok(application)
    }

    /// Approve or reject a pending application
    pub async fn decide_application(
        &self,
        admin: &User,
        application_id: i64,
        request: DecideApplicationRequest,
    ) -> Result<ProviderApplication, ProviderError> {
        let decision = Decision::from_request(&request).ok_or_else(|| ProviderError::Validation {
            field: "status",
            message: "Status must be 'approved' or 'rejected'.".to_string(),
        })?;

        let mut tx = self.db_pool.begin().await?;

        let application = sqlx::query_as::<_, ProviderApplication>(
            "SELECT * FROM provider_applications WHERE id = $1 FOR UPDATE",
        )
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ProviderError::NotFound("Application not found."))?;

        if application.status != ApplicationStatus::Pending {
            return Err(ProviderError::AlreadyReviewed);
        }

        let mut outbox = Outbox::new();
        let updated = match decision {
            Decision::Approve => {
                let provider_id: i64 = sqlx::query_scalar(
                    r#"
                    INSERT INTO provider_details (user_id, is_active, approved_at)
                    VALUES ($1, TRUE, NOW())
                    ON CONFLICT (user_id) DO UPDATE SET is_active = TRUE, approved_at = NOW()
                    RETURNING id
                    "#,
                )
                .bind(application.user_id)
                .fetch_one(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    INSERT INTO provider_services (provider_id, service_id, price, experience_years, is_active)
                    SELECT $1, service_id, price, experience_years, TRUE
                    FROM provider_application_services
                    WHERE application_id = $2
                    ON CONFLICT (provider_id, service_id) DO UPDATE SET
                        price = EXCLUDED.price,
                        experience_years = EXCLUDED.experience_years,
                        is_active = TRUE
                    "#,
                )
                .bind(provider_id)
                .bind(application.id)
                .execute(&mut *tx)
                .await?;

                sqlx::query("UPDATE users SET is_provider = TRUE WHERE id = $1")
                    .bind(application.user_id)
                    .execute(&mut *tx)
                    .await?;

                outbox.push(messages::application_approved(
                    application.id,
                    application.user_id,
                    admin.id,
                ));

                sqlx::query_as::<_, ProviderApplication>(
                    r#"
                    UPDATE provider_applications
                    SET status = 'approved', rejection_reason = NULL, replied_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(application.id)
                .fetch_one(&mut *tx)
                .await?
            }
            Decision::Reject { reason } => {
                sqlx::query("UPDATE users SET is_provider = FALSE WHERE id = $1")
                    .bind(application.user_id)
                    .execute(&mut *tx)
                    .await?;

                outbox.push(messages::application_rejected(
                    application.id,
                    application.user_id,
                    admin.id,
                    Some(&reason),
                ));

                sqlx::query_as::<_, ProviderApplication>(
                    r#"
                    UPDATE provider_applications
                    SET status = 'rejected', rejection_reason = $2, replied_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(application.id)
                .bind(&reason)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        tracing::info!(
            application_id,
            admin_id = admin.id,
            status = ?updated.status,
            "Provider application reviewed"
        );
        self.notifier.dispatch_all(outbox).await;

        Ok(updated)
    }

    /// Block or unblock a provider
    pub async fn set_active(
        &self,
        admin: &User,
        user_id: i64,
        is_active: bool,
    ) -> Result<ProviderDetails, ProviderError> {
        let mut tx = self.db_pool.begin().await?;

        let current = sqlx::query_as::<_, ProviderDetails>(
            "SELECT * FROM provider_details WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ProviderError::NotFound("Provider not found."))?;

        if current.is_active == is_active {
            tx.rollback().await?;
            return Ok(current);
        }

        let updated = sqlx::query_as::<_, ProviderDetails>(
            "UPDATE provider_details SET is_active = $1 WHERE id = $2 RETURNING *",
        )
        .bind(is_active)
        .bind(current.id)
        .fetch_one(&mut *tx)
        .await?;

        let mut outbox = Outbox::new();
        outbox.push(messages::provider_activation_changed(user_id, admin.id, is_active));

        tx.commit().await?;
        tracing::info!(user_id, admin_id = admin.id, is_active, "Provider activation changed");
        self.notifier.dispatch_all(outbox).await;

        Ok(updated)
    }
}
