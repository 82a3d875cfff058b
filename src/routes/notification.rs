//! Notification routes

use axum::{
    routing::{get, patch},
    Router,
};

use crate::handlers::notification;
use crate::state::AppState;

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notification/", get(notification::list_notifications))
        .route(
            "/notification/:id/mark-read/",
            patch(notification::mark_notification_read),
        )
}
