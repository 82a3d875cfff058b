//! Notification texts for domain events

use chrono::{NaiveDate, NaiveTime};

use super::model::{NewNotification, NotificationType, SourceRef};

/// Booking facts shared by the booking notifications
#[derive(Debug, Clone)]
pub struct BookingFacts<'a> {
    pub booking_id: i64,
    pub owner_id: i64,
    pub service_name: &'a str,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
}

impl BookingFacts<'_> {
    fn when(&self) -> String {
        format!(
            "{} at {}",
            self.booking_date.format("%Y-%m-%d"),
            self.booking_time.format("%H:%M")
        )
    }
}

pub fn booking_cancelled(facts: &BookingFacts<'_>, cancelled_by: i64) -> NewNotification {
    NewNotification {
        recipient_id: Some(facts.owner_id),
        sender_id: Some(cancelled_by),
        kind: NotificationType::Booking,
        title: "Booking Cancelled".to_string(),
        message: format!(
            "Booking #{} for {} on {} has been cancelled.",
            facts.booking_id,
            facts.service_name,
            facts.when()
        ),
        source: SourceRef::Booking(facts.booking_id),
    }
}

pub fn booking_refunded(facts: &BookingFacts<'_>, amount: rust_decimal::Decimal) -> NewNotification {
    NewNotification {
        recipient_id: Some(facts.owner_id),
        sender_id: None,
        kind: NotificationType::Payment,
        title: "Advance Refunded".to_string(),
        message: format!(
            "The advance of {} for booking #{} has been refunded to your wallet.",
            amount, facts.booking_id
        ),
        source: SourceRef::Booking(facts.booking_id),
    }
}

pub fn booking_status_changed(
    facts: &BookingFacts<'_>,
    changed_by: i64,
    status_label: &str,
) -> NewNotification {
    NewNotification {
        recipient_id: Some(facts.owner_id),
        sender_id: Some(changed_by),
        kind: NotificationType::Booking,
        title: "Booking Updated".to_string(),
        message: format!(
            "Booking #{} for {} on {} is now {}.",
            facts.booking_id,
            facts.service_name,
            facts.when(),
            status_label
        ),
        source: SourceRef::Booking(facts.booking_id),
    }
}

pub fn booking_accepted(facts: &BookingFacts<'_>, provider_id: i64, provider_name: &str) -> NewNotification {
    NewNotification {
        recipient_id: Some(facts.owner_id),
        sender_id: Some(provider_id),
        kind: NotificationType::Booking,
        title: "Booking Accepted".to_string(),
        message: format!(
            "{} accepted your booking #{} for {} on {}.",
            provider_name,
            facts.booking_id,
            facts.service_name,
            facts.when()
        ),
        source: SourceRef::Booking(facts.booking_id),
    }
}

pub fn booking_assigned(facts: &BookingFacts<'_>, provider_id: i64) -> NewNotification {
    NewNotification {
        recipient_id: Some(provider_id),
        sender_id: None,
        kind: NotificationType::Booking,
        title: "New Appointment".to_string(),
        message: format!(
            "Booking #{} for {} on {} has been assigned to you.",
            facts.booking_id,
            facts.service_name,
            facts.when()
        ),
        source: SourceRef::Booking(facts.booking_id),
    }
}

pub fn payment_received(
    booking_id: i64,
    owner_id: i64,
    amount: rust_decimal::Decimal,
    payment_label: &str,
) -> NewNotification {
    NewNotification {
        recipient_id: Some(owner_id),
        sender_id: None,
        kind: NotificationType::Payment,
        title: "Payment Received".to_string(),
        message: format!(
            "Your {} payment of {} for booking #{} was received.",
            payment_label, amount, booking_id
        ),
        source: SourceRef::Booking(booking_id),
    }
}

pub fn application_submitted(application_id: i64, applicant_id: i64, admin_id: Option<i64>) -> NewNotification {
    NewNotification {
        recipient_id: admin_id,
        sender_id: Some(applicant_id),
        kind: NotificationType::Provider,
        title: "New Provider Application".to_string(),
        message: format!("Provider application #{} is awaiting review.", application_id),
        source: SourceRef::Application(application_id),
    }
}

pub fn application_approved(application_id: i64, applicant_id: i64, admin_id: i64) -> NewNotification {
    NewNotification {
        recipient_id: Some(applicant_id),
        sender_id: Some(admin_id),
        kind: NotificationType::Provider,
        title: "Application Approved".to_string(),
        message: "Congratulations! Your provider application has been approved.".to_string(),
        source: SourceRef::Application(application_id),
    }
}

pub fn application_rejected(
    application_id: i64,
    applicant_id: i64,
    admin_id: i64,
    reason: Option<&str>,
) -> NewNotification {
    let message = match reason {
        Some(reason) if !reason.trim().is_empty() => {
            format!("Your provider application has been rejected. Reason: {}", reason.trim())
        }
        _ => "Your provider application has been rejected.".to_string(),
    };

    NewNotification {
        recipient_id: Some(applicant_id),
        sender_id: Some(admin_id),
        kind: NotificationType::Provider,
        title: "Application Rejected".to_string(),
        message,
        source: SourceRef::Application(application_id),
    }
}

pub fn provider_activation_changed(user_id: i64, admin_id: i64, is_active: bool) -> NewNotification {
    let (title, message) = if is_active {
        (
            "Account Unblocked",
            "Your provider account has been reactivated. You can accept bookings again.",
        )
    } else {
        (
            "Account Blocked",
            "Your provider account has been blocked by an administrator.",
        )
    };

    NewNotification {
        recipient_id: Some(user_id),
        sender_id: Some(admin_id),
        kind: NotificationType::Provider,
        title: title.to_string(),
        message: message.to_string(),
        source: SourceRef::System,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> BookingFacts<'static> {
        BookingFacts {
            booking_id: 7,
            owner_id: 3,
            service_name: "Plumbing",
            booking_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            booking_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_cancellation_goes_to_owner() {
        let n = booking_cancelled(&facts(), 11);
        assert_eq!(n.recipient_id, Some(3));
        assert_eq!(n.sender_id, Some(11));
        assert_eq!(n.source, SourceRef::Booking(7));
        assert_eq!(
            n.message,
            "Booking #7 for Plumbing on 2025-03-14 at 09:30 has been cancelled."
        );
    }

    #[test]
    fn test_assignment_goes_to_provider() {
        let n = booking_assigned(&facts(), 42);
        assert_eq!(n.recipient_id, Some(42));
        assert_eq!(n.sender_id, None);
    }

    #[test]
    fn test_rejection_reason_is_included_when_present() {
        let n = application_rejected(1, 2, 3, Some("  incomplete documents "));
        assert!(n.message.ends_with("Reason: incomplete documents"));

        let n = application_rejected(1, 2, 3, Some("   "));
        assert_eq!(n.message, "Your provider application has been rejected.");
    }
}
