//! Booking models and data structures

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use validator::Validate;

use crate::models::PageParams;

/// Booking status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::InProgress => "In Progress",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }
}

/// Advance owed up front: 2% of the price, floored at 50 and capped at 200.
/// A free booking owes nothing.
pub fn compute_advance(price: Decimal) -> Decimal {
    if price <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let two_percent = (price * Decimal::new(2, 2)).round_dp(2);
    two_percent
        .min(Decimal::new(200, 0))
        .max(Decimal::new(50, 0))
}

/// Amount still owed after the advance, never negative
pub fn remaining_amount(price: Decimal, advance: Decimal) -> Decimal {
    (price - advance).max(Decimal::ZERO)
}

/// Booking model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub service_id: i64,
    pub provider_id: Option<i64>,
    pub address_id: Option<i64>,
    pub full_name: String,
    pub phone: String,
    pub notes: Option<String>,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    pub price: Decimal,
    pub advance: Decimal,
    pub status: BookingStatus,
    pub is_advance_paid: bool,
    pub is_refunded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking joined with its display fields
#[derive(Debug, sqlx::FromRow)]
pub struct BookingRow {
    #[sqlx(flatten)]
    pub booking: Booking,
    pub service_name: String,
    pub provider_name: Option<String>,
    pub has_remaining_payment: bool,
}

/// Booking payload returned by every booking endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub service_name: String,
    pub provider_name: Option<String>,
    pub remaining: Decimal,
    pub is_remaining_paid: bool,
}

impl From<BookingRow> for BookingView {
    fn from(row: BookingRow) -> Self {
        let remaining = remaining_amount(row.booking.price, row.booking.advance);
        Self {
            is_remaining_paid: crate::payment::is_remaining_paid(
                row.booking.price,
                row.booking.advance,
                row.has_remaining_payment,
            ),
            remaining,
            service_name: row.service_name,
            provider_name: row.provider_name,
            booking: row.booking,
        }
    }
}

/// Request DTO for creating a booking
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub service: i64,
    pub address: i64,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    #[validate(length(min = 1, max = 100, message = "Full name is required (max 100 characters)."))]
    pub full_name: String,
    #[validate(length(min = 7, max = 15, message = "Enter a valid phone number."))]
    pub phone: String,
    pub notes: Option<String>,
}

/// Request DTO for the status endpoint
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, message = "This field is required."))]
    pub status: String,
}

/// Sort keys accepted by booking lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookingOrdering {
    #[default]
    DateDesc,
    DateAsc,
    PriceDesc,
    PriceAsc,
}

impl BookingOrdering {
    /// Unknown keys fall back to newest first
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("date_asc") => BookingOrdering::DateAsc,
            Some("price_desc") => BookingOrdering::PriceDesc,
            Some("price_asc") => BookingOrdering::PriceAsc,
            _ => BookingOrdering::DateDesc,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            BookingOrdering::DateDesc => " ORDER BY b.created_at DESC, b.id DESC",
            BookingOrdering::DateAsc => " ORDER BY b.created_at ASC, b.id ASC",
            BookingOrdering::PriceDesc => " ORDER BY b.price DESC, b.id DESC",
            BookingOrdering::PriceAsc => " ORDER BY b.price ASC, b.id ASC",
        }
    }
}

/// Query parameters for booking lists
#[derive(Debug, Default, Deserialize)]
pub struct BookingListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub category: Option<i64>,
    pub service: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub ordering: Option<String>,
}

impl BookingListQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            page_size: self.page_size,
        }
    }

    /// Blank values are treated as absent
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// `None` for "no filter" (absent, blank or `all`), `Err` for an unknown value
    pub fn status_filter(&self) -> Result<Option<BookingStatus>, String> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(raw) => BookingStatus::parse(raw)
                .map(Some)
                .ok_or_else(|| raw.to_string()),
        }
    }
}
