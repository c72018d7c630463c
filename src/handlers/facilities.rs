//! Facility HTTP handlers.
//!
//! This module implements the facility-related API endpoints:
//! - GET /api/v1/facilities - List facilities (admin or staff)
//! - POST /api/v1/facilities - Create a facility (admin)
//! - GET /api/v1/facilities/:id - Get one facility (admin or staff)
//! - POST /api/v1/facilities/:id/qr/rotate - Mint a new QR token (admin)

use crate::{
    app::AppState,
    error::AppError,
    models::{
        credential::RotateResponse,
        facility::{CreateFacilityRequest, Facility},
        principal::{Identity, Role},
    },
};
use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use uuid::Uuid;

pub async fn list_facilities(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Facility>>, AppError> {
    identity.require_staff_or_admin()?;

    let facilities = state.store.list_facilities().await?;

    Ok(Json(facilities))
}

/// Create a new facility.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Central Library",
///   "location": "Block A, Ground Floor"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the created facility
/// - **Error (400)**: Blank name or location, or a malformed body
/// - **Error (403)**: Caller is not an admin
pub async fn create_facility(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CreateFacilityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Facility>), AppError> {
    identity.require(Role::Admin)?;
    let Json(request) = payload?;
    request.validate().map_err(AppError::InvalidRequest)?;

    let facility = state
        .store
        .create_facility(request.name.trim(), request.location.trim())
        .await?;

    tracing::info!(facility_id = %facility.id, "Facility created");

    Ok((StatusCode::CREATED, Json(facility)))
}

pub async fn get_facility(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(facility_id): Path<Uuid>,
) -> Result<Json<Facility>, AppError> {
    identity.require_staff_or_admin()?;

    let facility = state
        .store
        .get_facility(facility_id)
        .await?
        .ok_or(AppError::FacilityNotFound)?;

    Ok(Json(facility))
}

/// Rotate the QR token for a facility.
///
/// # Endpoint
///
/// `POST /api/v1/facilities/:id/qr/rotate`
///
/// # Response (201)
///
/// ```json
/// {
///   "facility_id": "550e8400-...",
///   "qr_token": "qr1.550e8400...",
///   "valid_from": "2025-12-21T10:00:00Z",
///   "valid_until": "2025-12-21T10:05:00Z",
///   "ttl_seconds": 300
/// }
/// ```
///
/// The TTL is the server's configured value; the request cannot choose it.
pub async fn rotate_qr_token(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(facility_id): Path<Uuid>,
) -> Result<(StatusCode, Json<RotateResponse>), AppError> {
    let credential = state
        .issuer
        .rotate(&identity, facility_id, state.clock.now(), state.token_ttl)
        .await?;

    Ok((StatusCode::CREATED, Json(credential.into())))
}
