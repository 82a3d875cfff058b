//! HomeLift backend library
//!
//! Booking lifecycle, payment settlement, wallets and notifications for the
//! HomeLift home-services marketplace.

pub mod access;
pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod payment;
pub mod provider;
pub mod routes;
pub mod state;
pub mod wallet;
pub mod websocket;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use config::Config;
use state::AppState;

/// Full HTTP surface with middleware applied
pub fn build_router(state: AppState, config: &Config) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ws/notifications", get(websocket::ws_handler))
        .merge(routes::booking_routes())
        .merge(routes::payment_routes())
        .merge(routes::wallet_routes())
        .merge(routes::notification_routes())
        .merge(routes::provider_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers));

    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    app.layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(config.cors_allowed_origins.as_deref()))
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(middleware::REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(middleware::REQUEST_ID_HEADER)])
}
