//! API key authentication middleware.
//!
//! This middleware stands in for the external authentication collaborator.
//! For every protected request it:
//! 1. Extracts the API key from the Authorization header
//! 2. Hashes it and resolves it to a principal through the store
//! 3. Injects the verified `Identity` into the request
//! 4. Rejects unauthorized requests with HTTP 401
//!
//! Role checks happen later, in the services.

use crate::{app::AppState, error::AppError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of an API key, as stored in `principals.key_hash`.
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <key>` header from request
/// 2. Hash the `<key>` using SHA-256
/// 3. Look up an active principal with that hash
/// 4. If found: inject `Identity` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
///
/// # Returns
///
/// - `Ok(Response)` if authenticated successfully (calls next handler)
/// - `Err(AppError::InvalidApiKey)` if authentication fails (returns 401)
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidApiKey)?;

    // Expected format: "Bearer <api_key>"
    let api_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidApiKey)?;

    let identity = state
        .store
        .identity_by_key_hash(&hash_api_key(api_key))
        .await?
        .ok_or(AppError::InvalidApiKey)?;

    // Route handlers can now extract this using Extension<Identity>
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
