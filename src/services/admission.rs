//! Admission validator - turns a scanned QR token into an attendance record.
//!
//! # Checks, in order
//!
//! 1. Caller must be a student (`Forbidden`)
//! 2. Signature and payload (`InvalidToken`)
//! 3. Token was issued by us and the scanning context matches (`InvalidToken`)
//! 4. Validity window `valid_from <= now < valid_until` (`TokenExpired`)
//! 5. Facility still exists (`UnknownFacility`)
//! 6. Cooldown for (student, facility) (`DuplicateScan`)
//!
//! # Cooldown
//!
//! Each (student, facility) pair is either `Eligible` or `CoolingDown`. The
//! state is never stored; it is derived from the newest attendance row on
//! every admission. The final insert goes through
//! `AttendanceLog::append_outside_cooldown`, which repeats the check under a
//! per-pair lock so concurrent scans cannot both be credited.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        attendance::{AttendanceRecord, NewAttendanceRecord},
        principal::{Identity, Role},
    },
    services::qr_token::QrTokenSigner,
    store::Store,
};

/// Derived cooldown state of a (student, facility) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEligibility {
    Eligible,
    CoolingDown { remaining: Duration },
}

impl ScanEligibility {
    /// `CoolingDown` while `now - last_scanned_at < cooldown`.
    pub fn derive(
        last_scanned_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Self {
        match last_scanned_at {
            Some(last) if now - last < cooldown => ScanEligibility::CoolingDown {
                remaining: cooldown - (now - last),
            },
            _ => ScanEligibility::Eligible,
        }
    }

    fn into_result(self) -> Result<(), AppError> {
        match self {
            ScanEligibility::Eligible => Ok(()),
            ScanEligibility::CoolingDown { remaining } => Err(duplicate_scan(remaining)),
        }
    }
}

fn duplicate_scan(remaining: Duration) -> AppError {
    // Round up so clients never retry a moment too early.
    let millis = remaining.num_milliseconds().max(0);
    AppError::DuplicateScan {
        retry_after_secs: (millis + 999) / 1000,
    }
}

pub struct AdmissionValidator {
    store: Arc<dyn Store>,
    signer: Arc<QrTokenSigner>,
    cooldown: Duration,
}

impl AdmissionValidator {
    pub fn new(store: Arc<dyn Store>, signer: Arc<QrTokenSigner>, cooldown: Duration) -> Self {
        Self {
            store,
            signer,
            cooldown,
        }
    }

    /// Validate `scanned_token` for `identity` at server time `now` and
    /// record attendance if every check passes.
    ///
    /// `expected_facility` is the scanning context, when known (e.g. a kiosk
    /// fixed to one facility). A token for a different facility is rejected.
    ///
    /// Validation failures are expected outcomes and are returned without
    /// retrying; only storage errors indicate a system problem.
    pub async fn admit(
        &self,
        identity: &Identity,
        scanned_token: &str,
        expected_facility: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AppError> {
        let result = self
            .try_admit(identity, scanned_token, expected_facility, now)
            .await;

        match &result {
            Ok(record) => tracing::info!(
                student_id = %record.student_id,
                facility_id = %record.facility_id,
                "Attendance admitted"
            ),
            Err(e) if e.is_expected_outcome() => tracing::debug!(
                subject_id = %identity.subject_id,
                outcome = %e,
                "Admission rejected"
            ),
            Err(_) => {}
        }

        result
    }

    async fn try_admit(
        &self,
        identity: &Identity,
        scanned_token: &str,
        expected_facility: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord, AppError> {
        identity.require(Role::Student)?;
        let student_id = identity.subject_id;

        let claims = self.signer.verify(scanned_token)?;

        if expected_facility.is_some_and(|expected| expected != claims.facility_id) {
            return Err(AppError::InvalidToken);
        }

        // A correctly signed token we never persisted (e.g. its insert
        // failed) is not honoured.
        let credential = self
            .store
            .credential_by_token(scanned_token)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if credential.facility_id != claims.facility_id {
            return Err(AppError::InvalidToken);
        }
        if now < credential.valid_from {
            return Err(AppError::InvalidToken);
        }
        if !credential.is_valid_at(now) {
            return Err(AppError::TokenExpired);
        }

        if !self.store.facility_exists(claims.facility_id).await? {
            return Err(AppError::UnknownFacility);
        }

        let last = self.store.latest_scan(student_id, claims.facility_id).await?;
        ScanEligibility::derive(last.map(|r| r.scanned_at), now, self.cooldown).into_result()?;

        let record = NewAttendanceRecord {
            student_id,
            facility_id: claims.facility_id,
            scanned_at: now,
        };

        // Lost a race with a concurrent scan for the same pair.
        self.store
            .append_outside_cooldown(&record, self.cooldown)
            .await?
            .ok_or_else(|| duplicate_scan(self.cooldown))
    }
}
