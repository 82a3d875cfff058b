//! Notification inbox handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::notification::{NotificationService, NotificationView};

/// All of the caller's notifications, newest first
pub async fn list_notifications(
    State(notifications): State<Arc<NotificationService>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<Vec<NotificationView>>>> {
    let items = notifications.list_for(user.id).await?;
    Ok(Json(ApiResponse::ok(items)))
}

pub async fn mark_notification_read(
    State(notifications): State<Arc<NotificationService>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(notification_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if !notifications.mark_read(user.id, notification_id).await? {
        return Err(ApiError::NotFound("Notification not found.".to_string()));
    }

    Ok(Json(json!({ "detail": "Notification marked as read." })))
}
