//! Wallet handlers

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::wallet::{WalletService, WalletSummary};

/// Caller's balance and recent transactions
pub async fn get_wallet(
    State(wallets): State<Arc<WalletService>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> ApiResult<Json<ApiResponse<WalletSummary>>> {
    let summary = wallets
        .summary(user.id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
    Ok(Json(ApiResponse::ok(summary)))
}
