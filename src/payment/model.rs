//! Payment models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::chrono::{DateTime, Utc};
use thiserror::Error;
use validator::Validate;

use crate::booking::{remaining_amount, Booking, BookingView};

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

/// Which part of the price a payment settles
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    #[default]
    Advance,
    Remaining,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Advance => "advance",
            PaymentType::Remaining => "remaining",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "advance" => Some(PaymentType::Advance),
            "remaining" => Some(PaymentType::Remaining),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Wallet,
}

/// Structured contents of `payments.metadata`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PaymentMetadata {
    pub booking_id: i64,
    pub user_id: i64,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
}

impl PaymentMetadata {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "booking_id": self.booking_id,
            "user_id": self.user_id,
            "payment_type": self.payment_type.as_str(),
            "method": self.method,
        })
    }
}

/// Payment ledger row
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Payment {
    pub id: i64,
    pub booking_id: i64,
    pub external_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for both payment paths
#[derive(Debug, Deserialize, Validate)]
pub struct PaymentRequest {
    #[validate(range(min = 1, message = "A valid booking id is required."))]
    pub booking_id: i64,
    #[serde(default)]
    pub payment_type: PaymentType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_type: PaymentType,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletPaymentResponse {
    pub payment: Payment,
    pub wallet_balance: Decimal,
    pub booking: BookingView,
}

/// Why a booking cannot be charged
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChargeRejection {
    #[error("Cannot pay for a cancelled booking.")]
    BookingCancelled,

    #[error("Advance has already been paid for this booking.")]
    AdvanceAlreadyPaid,

    #[error("Advance must be paid before the remaining amount.")]
    AdvanceNotPaid,

    #[error("The remaining amount has already been paid.")]
    RemainingAlreadyPaid,

    #[error("There is no remaining balance to pay for this booking.")]
    NoRemainingBalance,

    #[error("Nothing to pay for this booking.")]
    NothingDue,
}

impl ChargeRejection {
    pub fn code(&self) -> &'static str {
        match self {
            ChargeRejection::BookingCancelled => "BOOKING_CANCELLED",
            ChargeRejection::AdvanceAlreadyPaid => "ADVANCE_ALREADY_PAID",
            ChargeRejection::AdvanceNotPaid => "ADVANCE_NOT_PAID",
            ChargeRejection::RemainingAlreadyPaid => "REMAINING_ALREADY_PAID",
            ChargeRejection::NoRemainingBalance => "NO_REMAINING_BALANCE",
            ChargeRejection::NothingDue => "NOTHING_DUE",
        }
    }
}

/// Whether the balance after the advance is settled
pub fn is_remaining_paid(price: Decimal, advance: Decimal, has_remaining_payment: bool) -> bool {
    remaining_amount(price, advance).is_zero() || has_remaining_payment
}

/// Amount to charge for `payment_type`, shared by the card and wallet paths
pub fn amount_due(
    booking: &Booking,
    payment_type: PaymentType,
    has_remaining_payment: bool,
) -> Result<Decimal, ChargeRejection> {
    if booking.status == crate::booking::BookingStatus::Cancelled {
        return Err(ChargeRejection::BookingCancelled);
    }

    match payment_type {
        PaymentType::Advance => {
            if booking.is_advance_paid {
                return Err(ChargeRejection::AdvanceAlreadyPaid);
            }
            if booking.advance <= Decimal::ZERO {
                return Err(ChargeRejection::NothingDue);
            }
            Ok(booking.advance)
        }
        PaymentType::Remaining => {
            if !booking.is_advance_paid {
                return Err(ChargeRejection::AdvanceNotPaid);
            }
            let remaining = remaining_amount(booking.price, booking.advance);
            if remaining.is_zero() {
                return Err(ChargeRejection::NoRemainingBalance);
            }
            if has_remaining_payment {
                return Err(ChargeRejection::RemainingAlreadyPaid);
            }
            Ok(remaining)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingStatus;
    use chrono::{NaiveDate, NaiveTime};

    fn booking(price: i64, advance: i64, is_advance_paid: bool) -> Booking {
        Booking {
            id: 1,
            user_id: 1,
            service_id: 1,
            provider_id: None,
            address_id: None,
            full_name: "Owner".to_string(),
            phone: "9999999999".to_string(),
            notes: None,
            booking_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            booking_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            price: Decimal::new(price, 0),
            advance: Decimal::new(advance, 0),
            status: BookingStatus::Pending,
            is_advance_paid,
            is_refunded: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_advance_due_once() {
        assert_eq!(
            amount_due(&booking(1000, 50, false), PaymentType::Advance, false),
            Ok(Decimal::new(50, 0))
        );
        assert_eq!(
            amount_due(&booking(1000, 50, true), PaymentType::Advance, false),
            Err(ChargeRejection::AdvanceAlreadyPaid)
        );
    }

    #[test]
    fn test_remaining_requires_paid_advance() {
        assert_eq!(
            amount_due(&booking(1000, 50, false), PaymentType::Remaining, false),
            Err(ChargeRejection::AdvanceNotPaid)
        );
    }

    #[test]
    fn test_remaining_rejected_when_already_settled() {
        assert_eq!(
            amount_due(&booking(1000, 50, true), PaymentType::Remaining, true),
            Err(ChargeRejection::RemainingAlreadyPaid)
        );
    }

    #[test]
    fn test_remaining_rejected_when_advance_covers_price() {
        assert_eq!(
            amount_due(&booking(40, 50, true), PaymentType::Remaining, false),
            Err(ChargeRejection::NoRemainingBalance)
        );
        assert_eq!(
            amount_due(&booking(50, 50, true), PaymentType::Remaining, false),
            Err(ChargeRejection::NoRemainingBalance)
        );
    }

    #[test]
    fn test_remaining_amount_due() {
        assert_eq!(
            amount_due(&booking(1000, 50, true), PaymentType::Remaining, false),
            Ok(Decimal::new(950, 0))
        );
    }

    #[test]
    fn test_cancelled_booking_cannot_be_charged() {
        let mut b = booking(1000, 50, false);
        b.status = BookingStatus::Cancelled;
        assert_eq!(
            amount_due(&b, PaymentType::Advance, false),
            Err(ChargeRejection::BookingCancelled)
        );
    }

    #[test]
    fn test_is_remaining_paid() {
        assert!(is_remaining_paid(Decimal::new(40, 0), Decimal::new(50, 0), false));
        assert!(is_remaining_paid(Decimal::new(1000, 0), Decimal::new(50, 0), true));
        assert!(!is_remaining_paid(Decimal::new(1000, 0), Decimal::new(50, 0), false));
    }

    #[test]
    fn test_payment_type_defaults_to_advance() {
        let req: PaymentRequest = serde_json::from_str(r#"{"booking_id": 4}"#).unwrap();
        assert_eq!(req.payment_type, PaymentType::Advance);

        let req: PaymentRequest =
            serde_json::from_str(r#"{"booking_id": 4, "payment_type": "remaining"}"#).unwrap();
        assert_eq!(req.payment_type, PaymentType::Remaining);
    }
}
