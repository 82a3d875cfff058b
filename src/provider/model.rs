//! Provider onboarding models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Provider profile of an approved user
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ProviderDetails {
    pub id: i64,
    pub user_id: i64,
    pub is_active: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ProviderApplication {
    pub id: i64,
    pub user_id: i64,
    pub status: ApplicationStatus,
    pub rejection_reason: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A service offered in an application
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct ApplicationServiceItem {
    pub service: i64,
    pub price: Option<Decimal>,
    #[validate(range(min = 0, max = 60, message = "Experience must be between 0 and 60 years."))]
    #[serde(default)]
    pub experience_years: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyRequest {
    #[validate(length(min = 1, message = "Select at least one service."))]
    pub services: Vec<ApplicationServiceItem>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecideApplicationRequest {
    #[validate(length(min = 1, message = "This field is required."))]
    pub status: String,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Reason stored when an admin rejects without giving one
pub const DEFAULT_REJECTION_REASON: &str = "Your application does not meet our current requirements.";

/// Decision requested by an admin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject { reason: String },
}

impl Decision {
    /// `None` for anything other than `approved` or `rejected`
    pub fn from_request(request: &DecideApplicationRequest) -> Option<Self> {
        match request.status.trim() {
            "approved" => Some(Decision::Approve),
            "rejected" => {
                let reason = request
                    .rejection_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(DEFAULT_REJECTION_REASON)
                    .to_string();
                Some(Decision::Reject { reason })
            }
            _ => None,
        }
    }
}
