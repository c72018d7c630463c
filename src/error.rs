//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::store::StoreError;

/// Seconds a client should wait before retrying after a storage outage.
const STORAGE_RETRY_AFTER_SECS: u64 = 1;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Admission outcomes**: `InvalidToken`, `TokenExpired`, `UnknownFacility`,
///   `DuplicateScan`. Expected results of scanning, shown to the user as-is.
/// - **Authorization**: `InvalidApiKey` (no verified caller) and `Forbidden`
///   (verified caller with the wrong role)
/// - **Resource Errors**: `FacilityNotFound`
/// - **Infrastructure**: `Storage` (retryable when unavailable) and
///   `Configuration` (fatal at startup)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Token signature did not verify, or the payload is malformed,
    /// not yet valid, unknown to the credential store, or bound to a
    /// different facility than the scanning context.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid QR token")]
    InvalidToken,

    /// Token verified but its validity window has ended.
    ///
    /// Returns HTTP 410 Gone.
    #[error("QR token has expired")]
    TokenExpired,

    /// Token is bound to a facility that no longer exists.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Facility referenced by the QR token does not exist")]
    UnknownFacility,

    /// Same student scanned the same facility within the cooldown window.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Duplicate scan attempt. Please wait a moment.")]
    DuplicateScan { retry_after_secs: i64 },

    /// Caller is authenticated but their role may not perform this action.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Access denied")]
    Forbidden,

    /// Facility targeted by rotation or lookup does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Facility not found")]
    FacilityNotFound,

    /// API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Store failure. `StoreError::Unavailable` maps to 503 with a
    /// `Retry-After` header; anything else is a 500.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Server is misconfigured (e.g. missing signing key). Raised at
    /// startup, where it aborts the process.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    /// Whether this is an expected admission/authorization outcome
    /// rather than a system failure.
    pub fn is_expected_outcome(&self) -> bool {
        matches!(
            self,
            AppError::InvalidToken
                | AppError::TokenExpired
                | AppError::UnknownFacility
                | AppError::DuplicateScan { .. }
                | AppError::Forbidden
        )
    }
}

/// Unreadable JSON bodies get the same error envelope as everything else.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// `duplicate_scan` additionally carries `retry_after_secs`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let mut extra = None;

        let (status, code, message) = match self {
            AppError::InvalidToken => (StatusCode::BAD_REQUEST, "invalid_token", self.to_string()),
            AppError::TokenExpired => (StatusCode::GONE, "token_expired", self.to_string()),
            AppError::UnknownFacility => {
                (StatusCode::NOT_FOUND, "unknown_facility", self.to_string())
            }
            AppError::DuplicateScan { retry_after_secs } => {
                extra = Some(retry_after_secs);
                (StatusCode::CONFLICT, "duplicate_scan", self.to_string())
            }
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AppError::FacilityNotFound => (
                StatusCode::NOT_FOUND,
                "facility_not_found",
                self.to_string(),
            ),
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Storage(StoreError::Unavailable(ref reason)) => {
                tracing::error!("Storage unavailable: {}", reason);
                retry_after = Some(STORAGE_RETRY_AFTER_SECS);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "storage_unavailable",
                    "Storage is temporarily unavailable, please retry".to_string(),
                )
            }
            AppError::Storage(ref e) => {
                tracing::error!("Storage failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Configuration(ref msg) => {
                tracing::error!("Configuration error surfaced per request: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(secs) = extra {
            error["retry_after_secs"] = json!(secs);
        }
        let body = Json(json!({ "error": error }));

        match retry_after {
            Some(secs) => (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response(),
            None => (status, body).into_response(),
        }
    }
}
