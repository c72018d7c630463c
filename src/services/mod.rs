//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They take the current time as an argument and never read a clock.

pub mod admission;
pub mod issuer;
pub mod qr_token;
