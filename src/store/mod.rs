//! Storage abstraction.
//!
//! The services only talk to these traits, so the admission core does not
//! depend on Postgres. `PgStore` is the production backend; tests run
//! against `MemoryStore`.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    attendance::{AttendanceRecord, NewAttendanceRecord},
    credential::{FacilityCredential, NewFacilityCredential},
    facility::Facility,
    principal::Identity,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

/// Uniform error type for all storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Timed out, pool exhausted, or connection lost. The caller may retry.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(error.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Run a store access with an upper bound on how long it may take.
pub async fn bounded<T, F>(timeout: Duration, access: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(timeout, access)
        .await
        .map_err(|_| StoreError::Unavailable(format!("store access exceeded {timeout:?}")))?
}

/// Issued facility credentials. Append-only: there is no update or delete.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_credential(
        &self,
        credential: &NewFacilityCredential,
    ) -> Result<FacilityCredential, StoreError>;

    async fn credential_by_token(
        &self,
        token: &str,
    ) -> Result<Option<FacilityCredential>, StoreError>;
}

/// Append-only log of admitted scans.
#[async_trait::async_trait]
pub trait AttendanceLog: Send + Sync {
    /// Most recent scan for the pair, if any.
    async fn latest_scan(
        &self,
        student_id: Uuid,
        facility_id: Uuid,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Append `record` unless the pair already has a record whose
    /// `scanned_at` lies strictly within `cooldown` of the new one.
    ///
    /// Returns `None` when the insert was suppressed. Implementations
    /// serialise the check and the insert per (student, facility).
    async fn append_outside_cooldown(
        &self,
        record: &NewAttendanceRecord,
        cooldown: chrono::Duration,
    ) -> Result<Option<AttendanceRecord>, StoreError>;
}

/// Facilities known to the system.
#[async_trait::async_trait]
pub trait FacilityDirectory: Send + Sync {
    async fn facility_exists(&self, facility_id: Uuid) -> Result<bool, StoreError>;

    async fn get_facility(&self, facility_id: Uuid) -> Result<Option<Facility>, StoreError>;

    async fn list_facilities(&self) -> Result<Vec<Facility>, StoreError>;

    async fn create_facility(&self, name: &str, location: &str) -> Result<Facility, StoreError>;
}

/// Resolves API keys (by SHA-256 hex digest) to verified identities.
#[async_trait::async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn identity_by_key_hash(&self, key_hash: &str) -> Result<Option<Identity>, StoreError>;
}

/// Everything the service needs from its backing store.
#[async_trait::async_trait]
pub trait Store: CredentialStore + AttendanceLog + FacilityDirectory + PrincipalDirectory {
    /// Cheap round trip used by the health check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Open interval of scan times that conflict with a scan at `scanned_at`.
///
/// Saturates at the representable range instead of overflowing.
pub(crate) fn cooldown_window(
    scanned_at: DateTime<Utc>,
    cooldown: chrono::Duration,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = scanned_at
        .checked_sub_signed(cooldown)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = scanned_at
        .checked_add_signed(cooldown)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}
