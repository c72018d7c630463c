//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, verified identity)
//! 2. Delegates to a service or the store, passing the server clock's `now`
//! 3. Returns HTTP response (JSON, status code)

/// Scan admission endpoint
pub mod attendance;
/// Facility management and QR rotation endpoints
pub mod facilities;
/// Health check endpoint
pub mod health;
