//! Booking status transition rules
//!
//! Pure decisions over a booking snapshot. The service layer loads and locks
//! the row, asks these functions what to do, then writes.

use thiserror::Error;

use super::model::{Booking, BookingStatus};

/// Rejected lifecycle operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid status '{0}'. Allowed values: pending, confirmed, in_progress, completed, cancelled.")]
    UnknownStatus(String),

    #[error("Cannot move out of completed status.")]
    LeavingCompleted,

    #[error("Cannot move out of cancelled status.")]
    LeavingCancelled,

    #[error("Cannot move booking from {} back to {}.", .from.as_str(), .to.as_str())]
    Backward {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("Completed bookings cannot be cancelled.")]
    CompletedNotCancellable,

    #[error("Booking is no longer pending.")]
    NotPending,

    #[error("Booking has already been assigned to a provider.")]
    AlreadyAssigned,

    #[error("The advance for this booking has not been paid yet.")]
    AdvanceNotPaid,

    #[error("You cannot accept your own booking.")]
    OwnBooking,
}

impl TransitionError {
    /// Machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::UnknownStatus(_) => "INVALID_STATUS",
            TransitionError::LeavingCompleted | TransitionError::CompletedNotCancellable => {
                "BOOKING_COMPLETED"
            }
            TransitionError::LeavingCancelled => "BOOKING_CANCELLED",
            TransitionError::Backward { .. } => "INVALID_TRANSITION",
            TransitionError::NotPending | TransitionError::AlreadyAssigned => "BOOKING_UNAVAILABLE",
            TransitionError::AdvanceNotPaid => "ADVANCE_NOT_PAID",
            TransitionError::OwnBooking => "OWN_BOOKING",
        }
    }
}

/// Outcome of a permitted status request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Requested status equals the current one
    Unchanged,
    Move {
        from: BookingStatus,
        to: BookingStatus,
    },
}

/// Outcome of a permitted cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    AlreadyCancelled,
    Cancel { from: BookingStatus },
}

/// Position along the forward path; `cancelled` is off the path
fn rank(status: BookingStatus) -> Option<u8> {
    match status {
        BookingStatus::Pending => Some(0),
        BookingStatus::Confirmed => Some(1),
        BookingStatus::InProgress => Some(2),
        BookingStatus::Completed => Some(3),
        BookingStatus::Cancelled => None,
    }
}

pub fn parse_status(raw: &str) -> Result<BookingStatus, TransitionError> {
    BookingStatus::parse(raw.trim()).ok_or_else(|| TransitionError::UnknownStatus(raw.to_string()))
}

/// Decide a status-endpoint request
pub fn check_transition(from: BookingStatus, to: BookingStatus) -> Result<Transition, TransitionError> {
    if from == to {
        return Ok(Transition::Unchanged);
    }

    match from {
        BookingStatus::Completed => return Err(TransitionError::LeavingCompleted),
        BookingStatus::Cancelled => return Err(TransitionError::LeavingCancelled),
        _ => {}
    }

    match (rank(from), rank(to)) {
        (Some(f), Some(t)) if t < f => Err(TransitionError::Backward { from, to }),
        _ => Ok(Transition::Move { from, to }),
    }
}

/// Decide a cancellation request
pub fn check_cancellation(status: BookingStatus) -> Result<Cancellation, TransitionError> {
    match status {
        BookingStatus::Completed => Err(TransitionError::CompletedNotCancellable),
        BookingStatus::Cancelled => Ok(Cancellation::AlreadyCancelled),
        from => Ok(Cancellation::Cancel { from }),
    }
}

/// Booking-side preconditions for a provider accepting a booking.
/// Eligibility and schedule conflicts need the database and are checked by the caller.
pub fn check_acceptable(booking: &Booking, provider_id: i64) -> Result<(), TransitionError> {
    if booking.status != BookingStatus::Pending {
        return Err(TransitionError::NotPending);
    }
    if booking.provider_id.is_some() {
        return Err(TransitionError::AlreadyAssigned);
    }
    if booking.user_id == provider_id {
        return Err(TransitionError::OwnBooking);
    }
    if !booking.is_advance_paid {
        return Err(TransitionError::AdvanceNotPaid);
    }
    Ok(())
}

/// Refund owed when cancelling, if any
pub fn refund_due(booking: &Booking) -> Option<rust_decimal::Decimal> {
    (booking.is_advance_paid && !booking.is_refunded && booking.advance > rust_decimal::Decimal::ZERO)
        .then_some(booking.advance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use rust_decimal::Decimal;
    use BookingStatus::*;

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            id: 1,
            user_id: 10,
            service_id: 5,
            provider_id: None,
            address_id: Some(3),
            full_name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            notes: None,
            booking_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            booking_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            price: Decimal::new(1000, 0),
            advance: Decimal::new(50, 0),
            status,
            is_advance_paid: true,
            is_refunded: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_forward_moves_are_allowed() {
        assert_eq!(
            check_transition(Pending, Confirmed),
            Ok(Transition::Move { from: Pending, to: Confirmed })
        );
        assert!(check_transition(Confirmed, InProgress).is_ok());
        assert!(check_transition(InProgress, Completed).is_ok());
        assert!(check_transition(Pending, Completed).is_ok());
    }

    #[test]
    fn test_cancel_reachable_from_every_non_terminal_state() {
        for from in [Pending, Confirmed, InProgress] {
            assert!(check_transition(from, Cancelled).is_ok());
            assert_eq!(check_cancellation(from), Ok(Cancellation::Cancel { from }));
        }
    }

    #[test]
    fn test_completed_is_final() {
        for to in [Pending, Confirmed, InProgress, Cancelled] {
            assert_eq!(check_transition(Completed, to), Err(TransitionError::LeavingCompleted));
        }
        assert_eq!(
            check_cancellation(Completed),
            Err(TransitionError::CompletedNotCancellable)
        );
        assert_eq!(
            TransitionError::CompletedNotCancellable.to_string(),
            "Completed bookings cannot be cancelled."
        );
    }

    #[test]
    fn test_cancelled_is_final() {
        for to in [Pending, Confirmed, InProgress, Completed] {
            assert_eq!(check_transition(Cancelled, to), Err(TransitionError::LeavingCancelled));
        }
        assert_eq!(check_cancellation(Cancelled), Ok(Cancellation::AlreadyCancelled));
    }

    #[test]
    fn test_backward_moves_are_rejected() {
        assert_eq!(
            check_transition(InProgress, Pending),
            Err(TransitionError::Backward { from: InProgress, to: Pending })
        );
        assert!(check_transition(Confirmed, Pending).is_err());
    }

    #[test]
    fn test_same_status_is_unchanged() {
        for status in BookingStatus::ALL {
            assert_eq!(check_transition(status, status), Ok(Transition::Unchanged));
        }
    }

    #[test]
    fn test_parse_status_rejects_unknown_values() {
        assert_eq!(parse_status(" confirmed "), Ok(Confirmed));
        let err = parse_status("archived").unwrap_err();
        assert_eq!(err.code(), "INVALID_STATUS");
    }

    #[test]
    fn test_accept_preconditions() {
        assert_eq!(check_acceptable(&booking(Pending), 20), Ok(()));
        assert_eq!(
            check_acceptable(&booking(Confirmed), 20),
            Err(TransitionError::NotPending)
        );

        let mut assigned = booking(Pending);
        assigned.provider_id = Some(21);
        assert_eq!(check_acceptable(&assigned, 20), Err(TransitionError::AlreadyAssigned));

        assert_eq!(check_acceptable(&booking(Pending), 10), Err(TransitionError::OwnBooking));

        let mut unpaid = booking(Pending);
        unpaid.is_advance_paid = false;
        assert_eq!(check_acceptable(&unpaid, 20), Err(TransitionError::AdvanceNotPaid));
    }

    #[test]
    fn test_refund_due_only_once_for_paid_advance() {
        assert_eq!(refund_due(&booking(Confirmed)), Some(Decimal::new(50, 0)));

        let mut refunded = booking(Confirmed);
        refunded.is_refunded = true;
        assert_eq!(refund_due(&refunded), None);

        let mut unpaid = booking(Pending);
        unpaid.is_advance_paid = false;
        assert_eq!(refund_due(&unpaid), None);
    }
}
