//! Payment settlement - card intents, wallet payments and webhook reconciliation

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::access::{self, Actor};
use crate::booking::{self, Booking, BookingError, BookingService, BookingStatus};
use crate::config::PaymentConfig;
use crate::error::ApiError;
use crate::models::User;
use crate::notification::{messages, Notifier, Outbox};
use crate::wallet::{self, WalletError};

use super::gateway::{
    from_minor_units, verify_signature, GatewayError, IntentRequest, PaymentGateway,
    SignatureError,
};
use super::model::{
    amount_due, ChargeRejection, Payment, PaymentIntentResponse, PaymentMetadata, PaymentMethod,
    PaymentStatus, PaymentType, WalletPaymentResponse,
};

/// Payment operation errors
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Booking not found.")]
    BookingNotFound,

    #[error("Only the booking owner can pay for it.")]
    NotOwner,

    #[error(transparent)]
    Rejected(#[from] ChargeRejection),

    #[error("Insufficient wallet balance.")]
    InsufficientBalance { available: Decimal, required: Decimal },

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl From<WalletError> for PaymentError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::InsufficientBalance {
                available,
                required,
            } => PaymentError::InsufficientBalance {
                available,
                required,
            },
            WalletError::InvalidAmount => PaymentError::Rejected(ChargeRejection::NothingDue),
            WalletError::DatabaseError(db) => PaymentError::DatabaseError(db),
        }
    }
}

impl From<BookingError> for PaymentError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::NotFound => PaymentError::BookingNotFound,
            BookingError::DatabaseError(db) => PaymentError::DatabaseError(db),
            other => PaymentError::Internal(other.to_string()),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::BookingNotFound => ApiError::NotFound(e.to_string()),
            PaymentError::NotOwner => ApiError::Forbidden(e.to_string()),
            PaymentError::Rejected(r) => ApiError::rule(r.code(), r.to_string()),
            PaymentError::InsufficientBalance { .. } => {
                ApiError::rule("INSUFFICIENT_BALANCE", e.to_string())
            }
            PaymentError::InvalidSignature(_) => ApiError::rule("INVALID_SIGNATURE", e.to_string()),
            PaymentError::InvalidPayload(_) => ApiError::BadRequest(e.to_string()),
            PaymentError::Gateway(g) => ApiError::ExternalServiceError(g.to_string()),
            PaymentError::DatabaseError(db) => ApiError::DatabaseError(db.to_string()),
            PaymentError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

/// What a webhook delivery did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Recorded { booking_id: i64, payment_id: i64 },
    AlreadyRecorded { booking_id: i64 },
    /// Settled against a cancelled booking and credited back to the wallet
    Refunded { booking_id: i64, payment_id: i64 },
    MarkedFailed { intent_id: String },
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: IntentObject,
}

#[derive(Debug, Deserialize)]
struct IntentObject {
    id: String,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    amount_received: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Payment service
#[derive(Clone)]
pub struct PaymentService {
    db_pool: PgPool,
    gateway: Arc<dyn PaymentGateway>,
    bookings: BookingService,
    notifier: Arc<Notifier>,
    config: PaymentConfig,
}

impl PaymentService {
    pub fn new(
        db_pool: PgPool,
        gateway: Arc<dyn PaymentGateway>,
        bookings: BookingService,
        notifier: Arc<Notifier>,
        config: PaymentConfig,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            bookings,
            notifier,
            config,
        }
    }

    /// Create a card payment intent and record it as a pending payment
    pub async fn create_payment_intent(
        &self,
        user: &User,
        booking_id: i64,
        payment_type: PaymentType,
    ) -> Result<PaymentIntentResponse, PaymentError> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(booking_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(PaymentError::BookingNotFound)?;

        ensure_payer(user, &booking)?;

        let mut conn = self.db_pool.acquire().await?;
        let has_remaining = has_remaining_payment(&mut conn, booking_id).await?;
        drop(conn);

        let amount = amount_due(&booking, payment_type, has_remaining)?;
        let metadata = PaymentMetadata {
            booking_id,
            user_id: user.id,
            payment_type,
            method: PaymentMethod::Card,
        };

        let intent = self
            .gateway
            .create_intent(IntentRequest {
                amount,
                currency: self.config.currency.clone(),
                metadata: HashMap::from([
                    ("booking_id".to_string(), booking_id.to_string()),
                    ("user_id".to_string(), user.id.to_string()),
                    ("payment_type".to_string(), payment_type.as_str().to_string()),
                ]),
            })
            .await?;

        sqlx::query(
            r#"
            INSERT INTO payments (booking_id, external_intent_id, amount, currency, status, metadata)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            ON CONFLICT (external_intent_id) DO NOTHING
            "#,
        )
        .bind(booking_id)
        .bind(&intent.id)
        .bind(amount)
        .bind(&self.config.currency)
        .bind(metadata.to_value())
        .execute(&self.db_pool)
        .await?;

        tracing::info!(
            booking_id,
            user_id = user.id,
            intent_id = %intent.id,
            amount = %amount,
            payment_type = payment_type.as_str(),
            "Payment intent created"
        );

        Ok(PaymentIntentResponse {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
            amount,
            currency: self.config.currency.clone(),
            payment_type,
        })
    }

    /// Settle synchronously from the owner's wallet.
    ///
    /// Debit, ledger entry, payment row and advance flag commit together or
    /// not at all.
    pub async fn pay_with_wallet(
        &self,
        user: &User,
        booking_id: i64,
        payment_type: PaymentType,
    ) -> Result<WalletPaymentResponse, PaymentError> {
        let mut tx = self.db_pool.begin().await?;

        let booking = booking::lock_booking(&mut tx, booking_id).await?;
        ensure_payer(user, &booking)?;

        let has_remaining = has_remaining_payment(&mut tx, booking_id).await?;
        let amount = amount_due(&booking, payment_type, has_remaining)?;

        let description = format!(
            "{} payment for booking #{}",
            match payment_type {
                PaymentType::Advance => "Advance",
                PaymentType::Remaining => "Remaining",
            },
            booking_id
        );
        let (wallet, _entry) = wallet::debit(&mut tx, user.id, amount, &description).await?;

        let metadata = PaymentMetadata {
            booking_id,
            user_id: user.id,
            payment_type,
            method: PaymentMethod::Wallet,
        };

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (booking_id, external_intent_id, amount, currency, status, metadata)
            VALUES ($1, $2, $3, $4, 'succeeded', $5)
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(format!("wallet_{}", Uuid::new_v4().simple()))
        .bind(amount)
        .bind(&self.config.currency)
        .bind(metadata.to_value())
        .fetch_one(&mut *tx)
        .await?;

        if payment_type == PaymentType::Advance {
            sqlx::query("UPDATE bookings SET is_advance_paid = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(booking_id)
                .execute(&mut *tx)
                .await?;
        }

        let mut outbox = Outbox::new();
        outbox.push(messages::payment_received(
            booking_id,
            booking.user_id,
            amount,
            payment_type.as_str(),
        ));

        tx.commit().await?;
        tracing::info!(
            booking_id,
            user_id = user.id,
            payment_id = payment.id,
            amount = %amount,
            payment_type = payment_type.as_str(),
            "Wallet payment completed"
        );
        self.notifier.dispatch_all(outbox).await;

        let booking = self.bookings.view(booking_id).await?;

        Ok(WalletPaymentResponse {
            payment,
            wallet_balance: wallet.balance,
            booking,
        })
    }

    /// Verify and apply a gateway webhook delivery
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        if let Some(secret) = self.config.webhook_secret.as_deref() {
            let header = signature.ok_or(SignatureError::Missing)?;
            verify_signature(
                payload,
                header,
                secret,
                self.config.webhook_tolerance_seconds,
                chrono::Utc::now().timestamp(),
            )?;
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

        let outcome = match event.event_type.as_str() {
            "payment_intent.succeeded" => self.record_success(event.data.object).await?,
            "payment_intent.payment_failed" => self.record_failure(event.data.object).await?,
            other => WebhookOutcome::Ignored(format!("unhandled event type {}", other)),
        };

        match &outcome {
            WebhookOutcome::Ignored(reason) => tracing::warn!("Webhook ignored: {}", reason),
            other => tracing::info!(outcome = ?other, "Webhook processed"),
        }

        Ok(outcome)
    }

    async fn record_success(&self, intent: IntentObject) -> Result<WebhookOutcome, PaymentError> {
        let Some(booking_id) = intent
            .metadata
            .get("booking_id")
            .and_then(|v| v.parse::<i64>().ok())
        else {
            return Ok(WebhookOutcome::Ignored(format!(
                "intent {} has no booking_id metadata",
                intent.id
            )));
        };

        let mut tx = self.db_pool.begin().await?;

        let booking = match booking::lock_booking(&mut tx, booking_id).await {
            Ok(booking) => booking,
            Err(BookingError::NotFound) => {
                return Ok(WebhookOutcome::Ignored(format!(
                    "booking {} for intent {} does not exist",
                    booking_id, intent.id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let payment_type = intent
            .metadata
            .get("payment_type")
            .and_then(|v| PaymentType::parse(v))
            .unwrap_or_default();

        let user_id = intent
            .metadata
            .get("user_id")
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(booking.user_id);

        let amount = intent
            .amount_received
            .filter(|a| *a > 0)
            .or(intent.amount)
            .map(from_minor_units)
            .unwrap_or(match payment_type {
                PaymentType::Advance => booking.advance,
                PaymentType::Remaining => booking::remaining_amount(booking.price, booking.advance),
            });

        let currency = intent
            .currency
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.config.currency.clone());

        let previous: Option<PaymentStatus> = sqlx::query_scalar(
            "SELECT status FROM payments WHERE external_intent_id = $1 FOR UPDATE",
        )
        .bind(&intent.id)
        .fetch_optional(&mut *tx)
        .await?;

        // A refunded row was settled once already; replaying it must not revive it
        if matches!(previous, Some(PaymentStatus::Succeeded | PaymentStatus::Refunded)) {
            tx.commit().await?;
            return Ok(WebhookOutcome::AlreadyRecorded { booking_id });
        }

        sqlx::query("UPDATE bookings SET is_advance_paid = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;

        let cancelled = booking.status == BookingStatus::Cancelled;
        let status = if cancelled {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::Succeeded
        };

        let metadata = PaymentMetadata {
            booking_id,
            user_id,
            payment_type,
            method: PaymentMethod::Card,
        };

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (booking_id, external_intent_id, amount, currency, status, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (external_intent_id) DO UPDATE SET
                status = EXCLUDED.status,
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                metadata = COALESCE(payments.metadata, EXCLUDED.metadata),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(&intent.id)
        .bind(amount)
        .bind(&currency)
        .bind(status)
        .bind(metadata.to_value())
        .fetch_one(&mut *tx)
        .await?;

        let mut outbox = Outbox::new();
        outbox.push(messages::payment_received(
            booking_id,
            booking.user_id,
            amount,
            payment_type.as_str(),
        ));

        // Money captured after the booking was cancelled goes straight back to the wallet
        if cancelled {
            booking::refund_to_wallet(&mut tx, &booking, amount, &mut outbox).await?;
        }

        tx.commit().await?;
        self.notifier.dispatch_all(outbox).await;

        if cancelled {
            return Ok(WebhookOutcome::Refunded {
                booking_id,
                payment_id: payment.id,
            });
        }

        Ok(WebhookOutcome::Recorded {
            booking_id,
            payment_id: payment.id,
        })
    }

    async fn record_failure(&self, intent: IntentObject) -> Result<WebhookOutcome, PaymentError> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = 'failed', updated_at = NOW()
            WHERE external_intent_id = $1 AND status = 'pending'
            "#,
        )
        .bind(&intent.id)
        .execute(&self.db_pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(WebhookOutcome::Ignored(format!(
                "no pending payment for intent {}",
                intent.id
            )));
        }

        Ok(WebhookOutcome::MarkedFailed {
            intent_id: intent.id,
        })
    }
}

fn ensure_payer(user: &User, booking: &Booking) -> Result<(), PaymentError> {
    let actor = Actor::from(user);
    if access::payer_access(&actor, booking).is_granted() {
        return Ok(());
    }
    if access::participant_access(&actor, booking).is_granted() {
        Err(PaymentError::NotOwner)
    } else {
        Err(PaymentError::BookingNotFound)
    }
}

async fn has_remaining_payment(conn: &mut PgConnection, booking_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM payments
            WHERE booking_id = $1
              AND status = 'succeeded'
              AND metadata->>'payment_type' = 'remaining'
        )
        "#,
    )
    .bind(booking_id)
    .fetch_one(conn)
    .await
}


