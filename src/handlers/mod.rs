//! API handlers for HomeLift

pub mod booking;
pub mod extract;
pub mod health;
pub mod notification;
pub mod payment;
pub mod provider;
pub mod wallet;

pub use booking::*;
pub use extract::ValidatedJson;
pub use health::health_check;
pub use notification::*;
pub use payment::*;
pub use provider::*;
pub use wallet::*;
