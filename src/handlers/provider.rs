//! Provider onboarding handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::ApiResult;
use crate::middleware::{AdminUser, AuthenticatedUser};
use crate::models::ApiResponse;
use crate::provider::{
    ApplyRequest, DecideApplicationRequest, ProviderApplication, ProviderDetails,
    ProviderService, SetActiveRequest,
};

use super::extract::ValidatedJson;

pub async fn apply_as_provider(
    State(providers): State<Arc<ProviderService>>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<ApplyRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ProviderApplication>>)> {
    let application = providers.apply(&user, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Application submitted successfully.",
            application,
        )),
    ))
}

pub async fn decide_application(
    State(providers): State<Arc<ProviderService>>,
    AdminUser(admin): AdminUser,
    Path(application_id): Path<i64>,
    ValidatedJson(request): ValidatedJson<DecideApplicationRequest>,
) -> ApiResult<Json<ApiResponse<ProviderApplication>>> {
    let application = providers
        .decide_application(&admin, application_id, request)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Application updated successfully.",
        application,
    )))
}

/// Block or unblock a provider
pub async fn set_provider_active(
    State(providers): State<Arc<ProviderService>>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    Json(request): Json<SetActiveRequest>,
) -> ApiResult<Json<ApiResponse<ProviderDetails>>> {
    let details = providers
        .set_active(&admin, user_id, request.is_active)
        .await?;
    let message = if details.is_active {
        "Provider unblocked."
    } else {
        "Provider blocked."
    };
    Ok(Json(ApiResponse::with_message(message, details)))
}
