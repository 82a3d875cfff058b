//! Route definitions for the HomeLift API

mod booking;
mod notification;
mod payment;
mod provider;
mod wallet;

pub use booking::booking_routes;
pub use notification::notification_routes;
pub use payment::payment_routes;
pub use provider::provider_routes;
pub use wallet::wallet_routes;
