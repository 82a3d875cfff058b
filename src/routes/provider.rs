//! Provider onboarding routes

use axum::{
    routing::{patch, post},
    Router,
};

use crate::handlers::provider;
use crate::state::AppState;

pub fn provider_routes() -> Router<AppState> {
    Router::new()
        .route("/provider/apply/", post(provider::apply_as_provider))
        .route(
            "/provider/application/:id/update/",
            patch(provider::decide_application),
        )
        .route(
            "/provider/:user_id/active/",
            patch(provider::set_provider_active),
        )
}
