//! Payment handlers

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::payment::{
    PaymentIntentResponse, PaymentRequest, PaymentService, WalletPaymentResponse,
};

use super::extract::ValidatedJson;

const SIGNATURE_HEADER: &str = "stripe-signature";

pub async fn create_payment_intent(
    State(payments): State<Arc<PaymentService>>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<PaymentRequest>,
) -> ApiResult<Json<ApiResponse<PaymentIntentResponse>>> {
    let intent = payments
        .create_payment_intent(&user, request.booking_id, request.payment_type)
        .await?;
    Ok(Json(ApiResponse::ok(intent)))
}

pub async fn wallet_pay(
    State(payments): State<Arc<PaymentService>>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<PaymentRequest>,
) -> ApiResult<Json<ApiResponse<WalletPaymentResponse>>> {
    let result = payments
        .pay_with_wallet(&user, request.booking_id, request.payment_type)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Payment completed from wallet.",
        result,
    )))
}

/// Gateway callback; the raw body is needed for signature verification
pub async fn payment_webhook(
    State(payments): State<Arc<PaymentService>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    payments.handle_webhook(&body, signature).await?;
    Ok(Json(json!({ "received": true })))
}
