//! Booking routes

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers::booking;
use crate::state::AppState;

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/booking/",
            get(booking::list_my_bookings).post(booking::create_booking),
        )
        .route(
            "/booking/details/:id/",
            get(booking::get_booking).delete(booking::cancel_booking),
        )
        .route("/booking/:id/status/", patch(booking::update_booking_status))
        .route("/booking/appointments/", get(booking::list_available_appointments))
        .route("/booking/my-appointments/", get(booking::list_assigned_appointments))
        .route(
            "/booking/appointments/:id/accept/",
            post(booking::accept_booking),
        )
        .route("/booking/admin/all/", get(booking::list_all_bookings))
}
