//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use std::time::Duration;

use crate::error::AppError;

/// Shortest HMAC key accepted for signing QR tokens.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Upper bound for the token TTL and the scan cooldown (one year).
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `QR_SIGNING_KEY` (required): HMAC key for QR tokens, at least 32 bytes
/// - `QR_TOKEN_TTL_SECS` (optional): lifetime of a rotated QR token, defaults to 300
/// - `SCAN_COOLDOWN_SECS` (optional): minimum gap between credited scans, defaults to 60
/// - `STORE_TIMEOUT_MS` (optional): bound on every database access, defaults to 2000
/// - `DB_MAX_CONNECTIONS` (optional): connection pool size, defaults to 5
#[derive(Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    /// Never logged; `Debug` is implemented by hand to redact it.
    #[serde(default)]
    pub qr_signing_key: String,

    /// The only source of truth for token lifetime. Clients receive it
    /// with every rotation and drive their countdown from it.
    #[serde(default = "default_token_ttl_secs")]
    pub qr_token_ttl_secs: u64,

    #[serde(default = "default_cooldown_secs")]
    pub scan_cooldown_secs: u64,

    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,
}

fn default_port() -> u16 {
    3000
}

fn default_token_ttl_secs() -> u64 {
    300
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_max_connections() -> u32 {
    5
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field("qr_signing_key", &"<redacted>")
            .field("qr_token_ttl_secs", &self.qr_token_ttl_secs)
            .field("scan_cooldown_secs", &self.scan_cooldown_secs)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("db_max_connections", &self.db_max_connections)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables, deserializes them into a Config struct
    /// and validates the result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Configuration` if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - The signing key is missing or too short
    /// - The TTL is zero, or the TTL or cooldown exceeds `MAX_WINDOW_SECS`
    pub fn from_env() -> Result<Self, AppError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        let config = envy::from_env::<Config>()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the token issuer cannot work with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.qr_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(AppError::Configuration(format!(
                "QR_SIGNING_KEY must be at least {MIN_SIGNING_KEY_LEN} bytes"
            )));
        }
        if self.qr_token_ttl_secs == 0 {
            return Err(AppError::Configuration(
                "QR_TOKEN_TTL_SECS must be positive".to_string(),
            ));
        }
        if self.qr_token_ttl_secs > MAX_WINDOW_SECS {
            return Err(AppError::Configuration(format!(
                "QR_TOKEN_TTL_SECS must not exceed {MAX_WINDOW_SECS}"
            )));
        }
        if self.scan_cooldown_secs > MAX_WINDOW_SECS {
            return Err(AppError::Configuration(format!(
                "SCAN_COOLDOWN_SECS must not exceed {MAX_WINDOW_SECS}"
            )));
        }
        if self.store_timeout_ms == 0 {
            return Err(AppError::Configuration(
                "STORE_TIMEOUT_MS must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        window(self.qr_token_ttl_secs)
    }

    pub fn scan_cooldown(&self) -> chrono::Duration {
        window(self.scan_cooldown_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Seconds to a `chrono::Duration`, clamped to `MAX_WINDOW_SECS`.
fn window(secs: u64) -> chrono::Duration {
    let secs = i64::try_from(secs.min(MAX_WINDOW_SECS)).unwrap_or(i64::MAX);
    chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
}
