//! Facility credential (rotating QR token) models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents an issued QR token from the database.
///
/// # Database Table
///
/// Maps to the `facility_credentials` table. Rows are append-only: a
/// rotation inserts a new row and never touches earlier ones, which stay
/// for audit and stop validating once `valid_until` has passed.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FacilityCredential {
    pub id: Uuid,

    /// Facility the token is bound to
    pub facility_id: Uuid,

    /// The signed token string rendered into the QR image
    pub token: String,

    /// Inclusive start of the validity window
    pub valid_from: DateTime<Utc>,

    /// Exclusive end of the validity window
    pub valid_until: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl FacilityCredential {
    /// Validity window is half-open: `valid_from <= now < valid_until`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now < self.valid_until
    }
}

/// Values needed to persist a freshly minted token.
#[derive(Debug, Clone)]
pub struct NewFacilityCredential {
    pub facility_id: Uuid,
    pub token: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Response body for the rotation endpoint.
///
/// # JSON Example
///
/// ```json
/// {
///   "facility_id": "550e8400-e29b-41d4-a716-446655440000",
///   "qr_token": "qr1.550e8400e29b41d4a716446655440000.1766311200000.1766311500000.9f...",
///   "valid_from": "2025-12-21T10:00:00Z",
///   "valid_until": "2025-12-21T10:05:00Z",
///   "ttl_seconds": 300
/// }
/// ```
///
/// `ttl_seconds` comes from server configuration; display clients should
/// schedule their next rotation from it rather than from a constant of
/// their own.
#[derive(Debug, Serialize)]
pub struct RotateResponse {
    pub facility_id: Uuid,
    pub qr_token: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl From<FacilityCredential> for RotateResponse {
    fn from(credential: FacilityCredential) -> Self {
        Self {
            facility_id: credential.facility_id,
            ttl_seconds: (credential.valid_until - credential.valid_from).num_seconds(),
            qr_token: credential.token,
            valid_from: credential.valid_from,
            valid_until: credential.valid_until,
        }
    }
}
