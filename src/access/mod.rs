//! Authorization predicates for booking operations
//!
//! Endpoints compose these predicates and act on the tagged [`Access`]
//! result instead of checking roles ad hoc.

use sqlx::PgConnection;

use crate::booking::Booking;
use crate::models::User;

/// Authenticated caller snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_provider: bool,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            is_provider: user.is_provider,
        }
    }
}

/// Capacity in which access was granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    AssignedProvider,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted(Role),
    Denied,
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }
}

pub fn is_admin(actor: &Actor) -> bool {
    actor.is_staff || actor.is_superuser
}

pub fn is_owner(actor: &Actor, booking: &Booking) -> bool {
    booking.user_id == actor.id
}

pub fn is_assigned_provider(actor: &Actor, booking: &Booking) -> bool {
    booking.provider_id == Some(actor.id)
}

/// Owner, assigned provider or admin: may view and cancel
pub fn participant_access(actor: &Actor, booking: &Booking) -> Access {
    if is_admin(actor) {
        Access::Granted(Role::Admin)
    } else if is_owner(actor, booking) {
        Access::Granted(Role::Owner)
    } else if is_assigned_provider(actor, booking) {
        Access::Granted(Role::AssignedProvider)
    } else {
        Access::Denied
    }
}

/// Assigned provider or admin: may drive the status
pub fn operator_access(actor: &Actor, booking: &Booking) -> Access {
    if is_admin(actor) {
        Access::Granted(Role::Admin)
    } else if is_assigned_provider(actor, booking) {
        Access::Granted(Role::AssignedProvider)
    } else {
        Access::Denied
    }
}

/// Owner only: may pay
pub fn payer_access(actor: &Actor, booking: &Booking) -> Access {
    if is_owner(actor, booking) {
        Access::Granted(Role::Owner)
    } else {
        Access::Denied
    }
}

/// Whether the user holds an active provider profile with an active,
/// approved mapping for the service
pub async fn is_eligible_provider(
    conn: &mut PgConnection,
    user_id: i64,
    service_id: i64,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM provider_details pd
            JOIN provider_services ps ON ps.provider_id = pd.id
            WHERE pd.user_id = $1
              AND pd.is_active = TRUE
              AND ps.service_id = $2
              AND ps.is_active = TRUE
        )
        "#,
    )
    .bind(user_id)
    .bind(service_id)
    .fetch_one(conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingStatus;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use rust_decimal::Decimal;

    fn actor(id: i64) -> Actor {
        Actor {
            id,
            is_staff: false,
            is_superuser: false,
            is_provider: false,
        }
    }

    fn booking(owner: i64, provider: Option<i64>) -> Booking {
        Booking {
            id: 1,
            user_id: owner,
            service_id: 1,
            provider_id: provider,
            address_id: None,
            full_name: "Owner".to_string(),
            phone: "9999999999".to_string(),
            notes: None,
            booking_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            booking_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            price: Decimal::new(1000, 0),
            advance: Decimal::new(50, 0),
            status: BookingStatus::Confirmed,
            is_advance_paid: true,
            is_refunded: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_participant_access() {
        let b = booking(1, Some(2));
        assert_eq!(participant_access(&actor(1), &b), Access::Granted(Role::Owner));
        assert_eq!(
            participant_access(&actor(2), &b),
            Access::Granted(Role::AssignedProvider)
        );
        assert_eq!(participant_access(&actor(3), &b), Access::Denied);

        let admin = Actor {
            is_staff: true,
            ..actor(3)
        };
        assert_eq!(participant_access(&admin, &b), Access::Granted(Role::Admin));
    }

    #[test]
    fn test_owner_cannot_operate_status() {
        let b = booking(1, Some(2));
        assert_eq!(operator_access(&actor(1), &b), Access::Denied);
        assert!(operator_access(&actor(2), &b).is_granted());

        let superuser = Actor {
            is_superuser: true,
            ..actor(9)
        };
        assert_eq!(operator_access(&superuser, &b), Access::Granted(Role::Admin));
    }

    #[test]
    fn test_only_owner_pays() {
        let b = booking(1, Some(2));
        assert!(payer_access(&actor(1), &b).is_granted());
        assert_eq!(payer_access(&actor(2), &b), Access::Denied);

        let admin = Actor {
            is_staff: true,
            ..actor(4)
        };
        assert_eq!(payer_access(&admin, &b), Access::Denied);
    }
}
