//! Wallet routes

use axum::{routing::get, Router};

use crate::handlers::wallet;
use crate::state::AppState;

pub fn wallet_routes() -> Router<AppState> {
    Router::new().route("/wallet/", get(wallet::get_wallet))
}
