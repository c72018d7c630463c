//! QR token signing and verification.
//!
//! # Token Format
//!
//! ```text
//! qr1.<facility id, simple uuid>.<issued-at ms>.<expires-at ms>.<nonce, 32 hex>.<hmac-sha256, 64 hex>
//! ```
//!
//! The HMAC covers everything before the final dot. It is verified in
//! constant time before any other field is parsed.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::{config::MIN_SIGNING_KEY_LEN, error::AppError};

type HmacSha256 = Hmac<Sha256>;

const VERSION: &str = "qr1";

/// Anything longer cannot be a token we minted.
const MAX_TOKEN_LEN: usize = 512;

const NONCE_LEN: usize = 16;

/// Decoded, signature-checked token contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub facility_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub nonce: [u8; NONCE_LEN],
}

impl TokenClaims {
    /// Claims for a new token with a fresh random nonce.
    pub fn new(facility_id: Uuid, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            facility_id,
            issued_at,
            expires_at,
            nonce: rand::random(),
        }
    }

    fn signing_input(&self) -> String {
        format!(
            "{VERSION}.{}.{}.{}.{}",
            self.facility_id.simple(),
            self.issued_at.timestamp_millis(),
            self.expires_at.timestamp_millis(),
            hex::encode(self.nonce)
        )
    }
}

/// HMAC-SHA256 signer for QR tokens.
///
/// Constructed once from configuration and shared by the issuer and the
/// validator. Separate instances with separate keys do not accept each
/// other's tokens.
#[derive(Clone)]
pub struct QrTokenSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for QrTokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrTokenSigner").finish_non_exhaustive()
    }
}

impl QrTokenSigner {
    /// # Errors
    ///
    /// `AppError::Configuration` if the key is shorter than 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, AppError> {
        if key.len() < MIN_SIGNING_KEY_LEN {
            return Err(AppError::Configuration(format!(
                "signing key must be at least {MIN_SIGNING_KEY_LEN} bytes"
            )));
        }
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|e| AppError::Configuration(format!("invalid signing key: {e}")))?;
        Ok(Self { mac })
    }

    fn mac(&self) -> HmacSha256 {
        self.mac.clone()
    }

    /// Produce the token string for `claims`.
    pub fn sign(&self, claims: &TokenClaims) -> String {
        let input = claims.signing_input();
        let mut mac = self.mac();
        mac.update(input.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("{input}.{signature}")
    }

    /// Check the signature and decode the claims.
    ///
    /// Does not look at the clock; expiry is the caller's decision.
    ///
    /// # Errors
    ///
    /// `AppError::InvalidToken` for any malformed, truncated, oversized or
    /// tampered input.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AppError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(AppError::InvalidToken);
        }

        let (input, signature_hex) = token.rsplit_once('.').ok_or(AppError::InvalidToken)?;
        let signature = hex::decode(signature_hex).map_err(|_| AppError::InvalidToken)?;

        let mut mac = self.mac();
        mac.update(input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AppError::InvalidToken)?;

        parse_signing_input(input).ok_or(AppError::InvalidToken)
    }
}

fn parse_signing_input(input: &str) -> Option<TokenClaims> {
    let mut parts = input.split('.');

    if parts.next()? != VERSION {
        return None;
    }
    let facility_id = Uuid::try_parse(parts.next()?).ok()?;
    let issued_at = DateTime::from_timestamp_millis(parts.next()?.parse().ok()?)?;
    let expires_at = DateTime::from_timestamp_millis(parts.next()?.parse().ok()?)?;

    let mut nonce = [0u8; NONCE_LEN];
    hex::decode_to_slice(parts.next()?, &mut nonce).ok()?;

    if parts.next().is_some() || expires_at <= issued_at {
        return None;
    }

    Some(TokenClaims {
        facility_id,
        issued_at,
        expires_at,
        nonce,
    })
}
