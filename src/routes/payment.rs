//! Payment routes

use axum::{routing::post, Router};

use crate::handlers::payment;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/payments/create-payment-intent/",
            post(payment::create_payment_intent),
        )
        .route("/payments/wallet-pay/", post(payment::wallet_pay))
        .route("/payments/webhook/", post(payment::payment_webhook))
}
