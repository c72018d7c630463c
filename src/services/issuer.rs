//! Token issuer - mints rotating QR tokens for facilities.
//!
//! # Rotation
//!
//! Each rotation appends a new credential row and leaves earlier rows alone.
//! Older tokens stop working when their own window ends; the validator
//! always re-checks expiry against the clock instead of assuming the latest
//! row is the only valid one.

use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        credential::{FacilityCredential, NewFacilityCredential},
        principal::{Identity, Role},
    },
    services::qr_token::{QrTokenSigner, TokenClaims},
    store::Store,
};

pub struct TokenIssuer {
    store: Arc<dyn Store>,
    signer: Arc<QrTokenSigner>,
}

impl TokenIssuer {
    pub fn new(store: Arc<dyn Store>, signer: Arc<QrTokenSigner>) -> Self {
        Self { store, signer }
    }

    /// Mint and persist a new token for `facility_id`, valid for `ttl`
    /// starting at `now`.
    ///
    /// # Process
    ///
    /// 1. Require the admin role
    /// 2. Confirm the facility exists
    /// 3. Sign `{facility, issued-at, expires-at, nonce}`
    /// 4. Append the credential row
    ///
    /// # Errors
    ///
    /// - `Forbidden`: caller is not an admin
    /// - `InvalidRequest`: `ttl` is under one millisecond or out of range
    /// - `FacilityNotFound`: no such facility
    /// - `Storage`: store failure; the caller decides whether to retry
    pub async fn rotate(
        &self,
        identity: &Identity,
        facility_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<FacilityCredential, AppError> {
        identity.require(Role::Admin)?;

        // Token timestamps have millisecond resolution.
        let ttl = Duration::milliseconds(ttl.num_milliseconds());
        if ttl <= Duration::zero() {
            return Err(AppError::InvalidRequest(
                "Token TTL must be at least one millisecond".to_string(),
            ));
        }

        if !self.store.facility_exists(facility_id).await? {
            return Err(AppError::FacilityNotFound);
        }

        // Tokens carry millisecond timestamps; truncate so the signed payload
        // and the stored row describe exactly the same window.
        let valid_from = now.trunc_subsecs(3);
        let valid_until = valid_from.checked_add_signed(ttl).ok_or_else(|| {
            AppError::InvalidRequest("Token TTL is out of range".to_string())
        })?;

        let claims = TokenClaims::new(facility_id, valid_from, valid_until);
        let token = self.signer.sign(&claims);

        let credential = self
            .store
            .insert_credential(&NewFacilityCredential {
                facility_id,
                token,
                valid_from,
                valid_until,
            })
            .await?;

        tracing::info!(
            facility_id = %facility_id,
            rotated_by = %identity.subject_id,
            valid_until = %credential.valid_until,
            "QR token rotated"
        );

        Ok(credential)
    }
}
