//! Attendance log models and API request/response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an admitted scan from the database.
///
/// # Database Table
///
/// Maps to the `attendance` table. Rows are immutable once written and are
/// read by external reporting.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct AttendanceRecord {
    pub id: Uuid,

    /// Subject id of the admitted student
    pub student_id: Uuid,

    pub facility_id: Uuid,

    /// Server clock at admission time, never client-supplied
    pub scanned_at: DateTime<Utc>,
}

/// Values needed to append an admitted scan.
#[derive(Debug, Clone, Copy)]
pub struct NewAttendanceRecord {
    pub student_id: Uuid,
    pub facility_id: Uuid,
    pub scanned_at: DateTime<Utc>,
}

/// Request body for marking attendance.
///
/// # JSON Example
///
/// ```json
/// {
///   "scanned_qr_token": "qr1.550e8400e29b41d4a716446655440000.1766311200000...",
///   "facility_id": "550e8400-e29b-41d4-a716-446655440000"
/// }
/// ```
///
/// `facility_id` is optional. Fixed scanning kiosks send it so that a token
/// photographed at one facility cannot be replayed at another.
#[derive(Debug, Deserialize)]
pub struct MarkAttendanceRequest {
    pub scanned_qr_token: String,

    #[serde(default)]
    pub facility_id: Option<Uuid>,
}

/// Response body for a successful admission.
#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    pub student_id: Uuid,
    pub facility_id: Uuid,
    pub scanned_at: DateTime<Utc>,
}

impl From<AttendanceRecord> for AttendanceResponse {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            student_id: record.student_id,
            facility_id: record.facility_id,
            scanned_at: record.scanned_at,
        }
    }
}
