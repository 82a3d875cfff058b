//! Authentication module for HomeLift
//!
//! Bearer-token verification. Tokens are minted by the account service and
//! carry the user id as subject.

mod jwt;
mod service;

pub use jwt::{generate_access_token, verify_token, Claims, JwtError};
pub use service::{AuthError, Authenticator};
