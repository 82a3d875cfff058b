//! Booking handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::booking::{
    BookingListQuery, BookingService, BookingView, CreateBookingRequest, ListScope,
    UpdateStatusRequest,
};
use crate::error::ApiResult;
use crate::middleware::{AdminUser, AuthenticatedUser, ProviderUser};
use crate::models::{ApiResponse, Page};

use super::extract::ValidatedJson;

/// Create a booking for the caller
pub async fn create_booking(
    State(bookings): State<Arc<BookingService>>,
    AuthenticatedUser(user): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<BookingView>>)> {
    let booking = bookings.create_booking(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Booking created successfully.", booking)),
    ))
}

/// Bookings created by the caller
pub async fn list_my_bookings(
    State(bookings): State<Arc<BookingService>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<BookingListQuery>,
) -> ApiResult<Json<Page<BookingView>>> {
    let page = bookings
        .list_bookings(ListScope::Owner(user.id), &query)
        .await?;
    Ok(Json(page))
}

/// Bookings the calling provider could accept
pub async fn list_available_appointments(
    State(bookings): State<Arc<BookingService>>,
    ProviderUser(provider): ProviderUser,
    Query(query): Query<BookingListQuery>,
) -> ApiResult<Json<Page<BookingView>>> {
    let page = bookings
        .list_bookings(ListScope::Available(provider.id), &query)
        .await?;
    Ok(Json(page))
}

/// Bookings assigned to the calling provider
pub async fn list_assigned_appointments(
    State(bookings): State<Arc<BookingService>>,
    ProviderUser(provider): ProviderUser,
    Query(query): Query<BookingListQuery>,
) -> ApiResult<Json<Page<BookingView>>> {
    let page = bookings
        .list_bookings(ListScope::Assigned(provider.id), &query)
        .await?;
    Ok(Json(page))
}

pub async fn list_all_bookings(
    State(bookings): State<Arc<BookingService>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<BookingListQuery>,
) -> ApiResult<Json<Page<BookingView>>> {
    let page = bookings.list_bookings(ListScope::All, &query).await?;
    Ok(Json(page))
}

pub async fn get_booking(
    State(bookings): State<Arc<BookingService>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(booking_id): Path<i64>,
) -> ApiResult<Json<ApiResponse<BookingView>>> {
    let booking = bookings.get_booking(&user, booking_id).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

/// Soft-cancel a booking
pub async fn cancel_booking(
    State(bookings): State<Arc<BookingService>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(booking_id): Path<i64>,
) -> ApiResult<Json<ApiResponse<BookingView>>> {
    let booking = bookings.cancel_booking(&user, booking_id).await?;
    Ok(Json(ApiResponse::with_message(
        "Booking cancelled successfully.",
        booking,
    )))
}

pub async fn update_booking_status(
    State(bookings): State<Arc<BookingService>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(booking_id): Path<i64>,
    ValidatedJson(request): ValidatedJson<UpdateStatusRequest>,
) -> ApiResult<Json<ApiResponse<BookingView>>> {
    let booking = bookings
        .update_status(&user, booking_id, &request.status)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Booking status updated.",
        booking,
    )))
}

/// Assign a pending booking to the calling provider
pub async fn accept_booking(
    State(bookings): State<Arc<BookingService>>,
    ProviderUser(provider): ProviderUser,
    Path(booking_id): Path<i64>,
) -> ApiResult<Json<ApiResponse<BookingView>>> {
    let booking = bookings.accept_booking(&provider, booking_id).await?;
    Ok(Json(ApiResponse::with_message(
        "Booking accepted successfully.",
        booking,
    )))
}
