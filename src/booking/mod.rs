//! Bookings: creation, role-scoped queries and the status lifecycle

pub mod lifecycle;
mod model;
mod service;

pub use model::{
    compute_advance, remaining_amount, Booking, BookingListQuery, BookingOrdering, BookingRow,
    BookingStatus, BookingView, CreateBookingRequest, UpdateStatusRequest,
};
pub(crate) use service::{lock_booking, refund_to_wallet};
pub use service::{BookingError, BookingService, ListScope};
