//! Facility data models and API request/response types.
//!
//! Facilities are owned by the facilities collaborator; the admission core
//! only relies on a facility id existing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a facility record from the database.
///
/// # Database Table
///
/// Maps to the `facilities` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Facility {
    /// Unique identifier, bound into every QR token minted for this facility
    pub id: Uuid,

    /// Display name, e.g. "Central Library"
    pub name: String,

    /// Free-form location, e.g. "Block A, Ground Floor"
    pub location: String,

    pub created_at: DateTime<Utc>,
}

/// Request body for creating a new facility.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Central Library",
///   "location": "Block A, Ground Floor"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateFacilityRequest {
    pub name: String,
    pub location: String,
}

impl CreateFacilityRequest {
    /// Both fields must contain something other than whitespace.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Facility name must not be empty".to_string());
        }
        if self.location.trim().is_empty() {
            return Err("Facility location must not be empty".to_string());
        }
        Ok(())
    }
}
