//! Attendance HTTP handlers.
//!
//! - POST /api/v1/attendance/mark - Admit a scanned QR token (student)

use crate::{
    app::AppState,
    error::AppError,
    models::{
        attendance::{AttendanceResponse, MarkAttendanceRequest},
        principal::Identity,
    },
};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

/// Mark attendance from a scanned QR code.
///
/// # Request Body
///
/// ```json
/// {
///   "scanned_qr_token": "qr1.550e8400...",
///   "facility_id": "550e8400-..."  // optional scanning context
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: `{student_id, facility_id, scanned_at}`
/// - **400** `invalid_token`, **410** `token_expired`, **404** `unknown_facility`,
///   **409** `duplicate_scan`, **403** `forbidden`, **503** `storage_unavailable`
/// - **400** `invalid_request`: body is not valid JSON or lacks a field
///
/// `scanned_at` is always the server's clock.
pub async fn mark_attendance(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<MarkAttendanceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AttendanceResponse>), AppError> {
    let Json(request) = payload?;
    let record = state
        .validator
        .admit(
            &identity,
            request.scanned_qr_token.trim(),
            request.facility_id,
            state.clock.now(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}
