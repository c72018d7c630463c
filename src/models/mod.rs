//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables.

/// Admitted scans
pub mod attendance;
/// Rotating QR tokens
pub mod credential;
/// Facility model
pub mod facility;
/// Verified callers and roles
pub mod principal;
