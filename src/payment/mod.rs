//! Card and wallet payments for bookings

pub mod gateway;
mod model;
mod service;

pub use gateway::{PaymentGateway, StripeGateway};
pub use model::{
    amount_due, is_remaining_paid, ChargeRejection, Payment, PaymentIntentResponse,
    PaymentMetadata, PaymentMethod, PaymentRequest, PaymentStatus, PaymentType,
    WalletPaymentResponse,
};
pub use service::{PaymentError, PaymentService, WebhookOutcome};
