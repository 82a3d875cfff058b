//! Booking service layer - creation, scoped queries and lifecycle mutations
//!
//! Every mutation locks the booking row for the whole check-then-write and
//! collects its notifications in an outbox that is dispatched after commit.

use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use crate::access::{self, Actor};
use crate::error::ApiError;
use crate::models::{Page, User};
use crate::notification::messages::{self, BookingFacts};
use crate::notification::{Notifier, Outbox};
use crate::wallet::{self, WalletError};

use super::lifecycle::{self, Cancellation, Transition, TransitionError};
use super::model::{
    compute_advance, Booking, BookingListQuery, BookingOrdering, BookingRow, BookingStatus,
    BookingView, CreateBookingRequest,
};

const BOOKING_VIEW_SELECT: &str = r#"
    SELECT
        b.*,
        s.name AS service_name,
        COALESCE(NULLIF(TRIM(CONCAT(p.first_name, ' ', p.last_name)), ''), p.username) AS provider_name,
        EXISTS (
            SELECT 1 FROM payments pm
            WHERE pm.booking_id = b.id
              AND pm.status = 'succeeded'
              AND pm.metadata->>'payment_type' = 'remaining'
        ) AS has_remaining_payment
    FROM bookings b
    JOIN services s ON s.id = b.service_id
    JOIN users u ON u.id = b.user_id
    LEFT JOIN users p ON p.id = b.provider_id
"#;

const BOOKING_COUNT_SELECT: &str = r#"
    SELECT COUNT(*)
    FROM bookings b
    JOIN services s ON s.id = b.service_id
    JOIN users u ON u.id = b.user_id
    LEFT JOIN users p ON p.id = b.provider_id
"#;

/// Booking operation errors
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Booking not found.")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("You already have a confirmed booking at this date and time.")]
    ScheduleConflict,

    #[error("Refund failed: {0}")]
    Refund(#[from] WalletError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::NotFound => ApiError::NotFound(e.to_string()),
            BookingError::Forbidden(msg) => ApiError::Forbidden(msg),
            BookingError::Validation { field, message } => ApiError::field(field, &message),
            BookingError::Transition(TransitionError::OwnBooking) => {
                ApiError::Forbidden(TransitionError::OwnBooking.to_string())
            }
            BookingError::Transition(t) => ApiError::rule(t.code(), t.to_string()),
            BookingError::ScheduleConflict => ApiError::rule("SCHEDULE_CONFLICT", e.to_string()),
            BookingError::Refund(w) => ApiError::InternalError(w.to_string()),
            BookingError::DatabaseError(db) => ApiError::DatabaseError(db.to_string()),
        }
    }
}

/// Which bookings a list query may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Bookings the user created
    Owner(i64),
    /// Pending, paid, unassigned bookings the provider could accept
    Available(i64),
    /// Bookings assigned to the provider
    Assigned(i64),
    /// Everything
    All,
}

/// Resolved list filters
#[derive(Debug, Default)]
struct ListFilter {
    search: Option<String>,
    status: Option<BookingStatus>,
    category: Option<i64>,
    service: Option<String>,
    date_from: Option<chrono::NaiveDate>,
    date_to: Option<chrono::NaiveDate>,
}

impl ListFilter {
    fn from_query(query: &BookingListQuery) -> Result<Self, BookingError> {
        let status = query.status_filter().map_err(|raw| BookingError::Validation {
            field: "status",
            message: format!("'{}' is not a valid booking status.", raw),
        })?;

        Ok(Self {
            search: query.search_term().map(str::to_string),
            status,
            category: query.category,
            service: query.service_name().map(str::to_string),
            date_from: query.date_from,
            date_to: query.date_to,
        })
    }

    fn push(&self, qb: &mut QueryBuilder<'_, Postgres>, scope: ListScope) {
        qb.push(" WHERE 1=1");

        match scope {
            ListScope::Owner(user_id) => {
                qb.push(" AND b.user_id = ").push_bind(user_id);
            }
            ListScope::Available(provider_id) => {
                qb.push(" AND b.status = 'pending' AND b.provider_id IS NULL AND b.is_advance_paid = TRUE");
                qb.push(" AND b.user_id <> ").push_bind(provider_id);
                qb.push(
                    " AND b.service_id IN (SELECT ps.service_id FROM provider_services ps \
                     JOIN provider_details pd ON pd.id = ps.provider_id \
                     WHERE ps.is_active = TRUE AND pd.is_active = TRUE AND pd.user_id = ",
                )
                .push_bind(provider_id)
                .push(")");
            }
            ListScope::Assigned(provider_id) => {
                qb.push(" AND b.provider_id = ").push_bind(provider_id);
            }
            ListScope::All => {}
        }

        if let Some(status) = self.status {
            qb.push(" AND b.status = ").push_bind(status);
        }

        if let Some(category) = self.category {
            qb.push(" AND s.category_id = ").push_bind(category);
        }

        if let Some(service) = &self.service {
            qb.push(" AND LOWER(s.name) = LOWER(").push_bind(service.clone()).push(")");
        }

        if let Some(date_from) = self.date_from {
            qb.push(" AND b.created_at::date >= ").push_bind(date_from);
        }

        if let Some(date_to) = self.date_to {
            qb.push(" AND b.created_at::date <= ").push_bind(date_to);
        }

        if let Some(search) = &self.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (s.name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR b.full_name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR p.first_name ILIKE ").push_bind(pattern.clone());
            qb.push(" OR p.username ILIKE ").push_bind(pattern.clone());
            if scope == ListScope::All {
                qb.push(" OR u.username ILIKE ").push_bind(pattern.clone());
            }
            qb.push(" OR CAST(b.id AS TEXT) LIKE ").push_bind(pattern);
            qb.push(")");
        }
    }
}

/// Booking service
#[derive(Clone)]
pub struct BookingService {
    db_pool: PgPool,
    notifier: Arc<Notifier>,
}

impl BookingService {
    pub fn new(db_pool: PgPool, notifier: Arc<Notifier>) -> Self {
        Self { db_pool, notifier }
    }

    /// Create a pending booking priced from the service
    pub async fn create_booking(
        &self,
        owner: &User,
        request: CreateBookingRequest,
    ) -> Result<BookingView, BookingError> {
        let address_owned: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM addresses WHERE id = $1 AND user_id = $2)",
        )
        .bind(request.address)
        .bind(owner.id)
        .fetch_one(&self.db_pool)
        .await?;

        if !address_owned {
            return Err(BookingError::Validation {
                field: "address",
                message: "Invalid address selected.".to_string(),
            });
        }

        let price: rust_decimal::Decimal =
            sqlx::query_scalar("SELECT price FROM services WHERE id = $1 AND is_active = TRUE")
                .bind(request.service)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or_else(|| BookingError::Validation {
                    field: "service",
                    message: "Invalid service selected.".to_string(),
                })?;

        let advance = compute_advance(price);
        let notes = request
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let booking_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO bookings (
                user_id, service_id, address_id, full_name, phone, notes,
                booking_date, booking_time, price, advance, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending')
            RETURNING id
            "#,
        )
        .bind(owner.id)
        .bind(request.service)
        .bind(request.address)
        .bind(request.full_name.trim())
        .bind(request.phone.trim())
        .bind(notes)
        .bind(request.booking_date)
        .bind(request.booking_time)
        .bind(price)
        .bind(advance)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(
            booking_id,
            user_id = owner.id,
            price = %price,
            advance = %advance,
            "Booking created"
        );

        self.view(booking_id).await
    }

    /// Paginated, filtered list under a visibility scope
    pub async fn list_bookings(
        &self,
        scope: ListScope,
        query: &BookingListQuery,
    ) -> Result<Page<BookingView>, BookingError> {
        let filter = ListFilter::from_query(query)?;
        let params = query.page_params();

        let mut count_builder = QueryBuilder::<Postgres>::new(BOOKING_COUNT_SELECT);
        filter.push(&mut count_builder, scope);
        let count: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.db_pool)
            .await?;

        let mut query_builder = QueryBuilder::<Postgres>::new(BOOKING_VIEW_SELECT);
        filter.push(&mut query_builder, scope);

        if let ListScope::Assigned(_) = scope {
            query_builder.push(" ORDER BY b.booking_date DESC, b.booking_time DESC, b.id DESC");
        } else {
            query_builder.push(BookingOrdering::parse(query.ordering.as_deref()).sql());
        }

        query_builder.push(" LIMIT ").push_bind(params.page_size());
        query_builder.push(" OFFSET ").push_bind(params.offset());

        let rows = query_builder
            .build_query_as::<BookingRow>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(BookingView::from).collect(),
            count,
            params,
        ))
    }

    /// A booking the caller may see; anything else is reported as not found
    pub async fn get_booking(&self, user: &User, booking_id: i64) -> Result<BookingView, BookingError> {
        let view = self.view(booking_id).await?;
        if !access::participant_access(&Actor::from(user), &view.booking).is_granted() {
            return Err(BookingError::NotFound);
        }
        Ok(view)
    }

    /// Soft-cancel a booking, refunding a paid advance to the owner's wallet
    pub async fn cancel_booking(&self, user: &User, booking_id: i64) -> Result<BookingView, BookingError> {
        let actor = Actor::from(user);
        let mut tx = self.db_pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;
        if !access::participant_access(&actor, &booking).is_granted() {
            return Err(BookingError::NotFound);
        }

        let mut outbox = Outbox::new();
        match lifecycle::check_cancellation(booking.status)? {
            Cancellation::AlreadyCancelled => {
                tx.rollback().await?;
                return self.view(booking_id).await;
            }
            Cancellation::Cancel { from } => {
                apply_cancellation(&mut tx, &booking, actor.id, &mut outbox).await?;
                tracing::info!(booking_id, user_id = actor.id, from = from.as_str(), "Booking cancelled");
            }
        }

        tx.commit().await?;
        self.notifier.dispatch_all(outbox).await;

        self.view(booking_id).await
    }

    /// Move a booking to a new status (assigned provider or admin)
    pub async fn update_status(
        &self,
        user: &User,
        booking_id: i64,
        raw_status: &str,
    ) -> Result<BookingView, BookingError> {
        let target = lifecycle::parse_status(raw_status)?;
        let actor = Actor::from(user);
        let mut tx = self.db_pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;
        if !access::participant_access(&actor, &booking).is_granted() {
            return Err(BookingError::NotFound);
        }
        if !access::operator_access(&actor, &booking).is_granted() {
            return Err(BookingError::Forbidden(
                "Only the assigned provider or an admin can update this booking.".to_string(),
            ));
        }

        let mut outbox = Outbox::new();
        match lifecycle::check_transition(booking.status, target)? {
            Transition::Unchanged => {
                tx.rollback().await?;
                return self.view(booking_id).await;
            }
            Transition::Move {
                to: BookingStatus::Cancelled,
                ..
            } => {
                apply_cancellation(&mut tx, &booking, actor.id, &mut outbox).await?;
            }
            Transition::Move { to, .. } => {
                sqlx::query("UPDATE bookings SET status = $1, updated_at = NOW() WHERE id = $2")
                    .bind(to)
                    .bind(booking_id)
                    .execute(&mut *tx)
                    .await?;

                let service_name = service_name(&mut tx, booking.service_id).await?;
                outbox.push(messages::booking_status_changed(
                    &facts(&booking, &service_name),
                    actor.id,
                    to.label(),
                ));
            }
        }

        tx.commit().await?;
        tracing::info!(
            booking_id,
            user_id = actor.id,
            from = booking.status.as_str(),
            to = target.as_str(),
            "Booking status updated"
        );
        self.notifier.dispatch_all(outbox).await;

        self.view(booking_id).await
    }

    /// Assign a pending booking to the calling provider and confirm it
    pub async fn accept_booking(&self, provider: &User, booking_id: i64) -> Result<BookingView, BookingError> {
        let mut tx = self.db_pool.begin().await?;

        let booking = lock_booking(&mut tx, booking_id).await?;
        lifecycle::check_acceptable(&booking, provider.id)?;

        // Serializes accepts by the same provider so the slot check below holds.
        let profile_active: Option<bool> = sqlx::query_scalar(
            "SELECT is_active FROM provider_details WHERE user_id = $1 FOR UPDATE",
        )
        .bind(provider.id)
        .fetch_optional(&mut *tx)
        .await?;

        if profile_active != Some(true) {
            return Err(BookingError::Forbidden(
                "Your provider account is not active.".to_string(),
            ));
        }

        if !access::is_eligible_provider(&mut tx, provider.id, booking.service_id).await? {
            return Err(BookingError::Forbidden(
                "You are not approved to provide this service.".to_string(),
            ));
        }

        let slot_taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE provider_id = $1
                  AND booking_date = $2
                  AND booking_time = $3
                  AND status IN ('confirmed', 'in_progress')
                  AND id <> $4
            )
            "#,
        )
        .bind(provider.id)
        .bind(booking.booking_date)
        .bind(booking.booking_time)
        .bind(booking.id)
        .fetch_one(&mut *tx)
        .await?;

        if slot_taken {
            return Err(BookingError::ScheduleConflict);
        }

        sqlx::query(
            "UPDATE bookings SET provider_id = $1, status = 'confirmed', updated_at = NOW() WHERE id = $2",
        )
        .bind(provider.id)
        .bind(booking_id)
        .execute(&mut *tx)
        .await?;

        let service_name = service_name(&mut tx, booking.service_id).await?;
        let booking_facts = facts(&booking, &service_name);
        let mut outbox = Outbox::new();
        outbox.push(messages::booking_accepted(
            &booking_facts,
            provider.id,
            &display_name(provider),
        ));
        outbox.push(messages::booking_assigned(&booking_facts, provider.id));

        tx.commit().await?;
        tracing::info!(booking_id, provider_id = provider.id, "Booking accepted");
        self.notifier.dispatch_all(outbox).await;

        self.view(booking_id).await
    }

    pub(crate) async fn view(&self, booking_id: i64) -> Result<BookingView, BookingError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE b.id = $1", BOOKING_VIEW_SELECT))
            .bind(booking_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(BookingError::NotFound)?;

        Ok(BookingView::from(row))
    }
}

/// Load a booking and hold its row lock until the transaction ends
pub(crate) async fn lock_booking(conn: &mut PgConnection, booking_id: i64) -> Result<Booking, BookingError> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
        .bind(booking_id)
        .fetch_optional(conn)
        .await?
        .ok_or(BookingError::NotFound)
}

/// Write a cancellation, with its refund and notifications, inside `conn`'s transaction
async fn apply_cancellation(
    conn: &mut PgConnection,
    booking: &Booking,
    actor_id: i64,
    outbox: &mut Outbox,
) -> Result<(), BookingError> {
    sqlx::query("UPDATE bookings SET status = 'cancelled', updated_at = NOW() WHERE id = $1")
        .bind(booking.id)
        .execute(&mut *conn)
        .await?;

    let service_name = service_name(conn, booking.service_id).await?;
    let booking_facts = facts(booking, &service_name);
    outbox.push(messages::booking_cancelled(&booking_facts, actor_id));

    if let Some(amount) = lifecycle::refund_due(booking) {
        refund_to_wallet(conn, booking, amount, outbox).await?;

        sqlx::query(
            r#"
            UPDATE payments SET status = 'refunded', updated_at = NOW()
            WHERE booking_id = $1
              AND status = 'succeeded'
              AND COALESCE(metadata->>'payment_type', 'advance') = 'advance'
            "#,
        )
        .bind(booking.id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Credit `amount` back to the owner's wallet and flag the booking refunded.
/// The caller's transaction must already hold the booking row lock.
pub(crate) async fn refund_to_wallet(
    conn: &mut PgConnection,
    booking: &Booking,
    amount: Decimal,
    outbox: &mut Outbox,
) -> Result<(), BookingError> {
    wallet::credit(
        conn,
        booking.user_id,
        amount,
        &format!("Refund for booking #{}", booking.id),
    )
    .await?;

    sqlx::query("UPDATE bookings SET is_refunded = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(booking.id)
        .execute(&mut *conn)
        .await?;

    let service_name = service_name(conn, booking.service_id).await?;
    outbox.push(messages::booking_refunded(&facts(booking, &service_name), amount));

    tracing::info!(booking_id = booking.id, amount = %amount, "Refund credited to wallet");
    Ok(())
}

async fn service_name(conn: &mut PgConnection, service_id: i64) -> Result<String, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM services WHERE id = $1")
        .bind(service_id)
        .fetch_one(conn)
        .await
}

fn facts<'a>(booking: &Booking, service_name: &'a str) -> BookingFacts<'a> {
    BookingFacts {
        booking_id: booking.id,
        owner_id: booking.user_id,
        service_name,
        booking_date: booking.booking_date,
        booking_time: booking.booking_time,
    }
}

fn display_name(user: &User) -> String {
    let full = format!("{} {}", user.first_name, user.last_name);
    let full = full.trim();
    if full.is_empty() {
        user.username.clone()
    } else {
        full.to_string()
    }
}
