//! Shared application state and HTTP router.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    clock::Clock,
    handlers, middleware,
    services::{admission::AdmissionValidator, issuer::TokenIssuer, qr_token::QrTokenSigner},
    store::Store,
};

/// State shared with every handler via `State<AppState>`.
///
/// Built once at startup from configuration. Nothing in here is a global:
/// two states with different keys or clocks can coexist.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub issuer: Arc<TokenIssuer>,
    pub validator: Arc<AdmissionValidator>,
    pub clock: Arc<dyn Clock>,
    /// Lifetime of every rotated token.
    pub token_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        signer: QrTokenSigner,
        clock: Arc<dyn Clock>,
        token_ttl: chrono::Duration,
        scan_cooldown: chrono::Duration,
    ) -> Self {
        let signer = Arc::new(signer);
        Self {
            issuer: Arc::new(TokenIssuer::new(store.clone(), signer.clone())),
            validator: Arc::new(AdmissionValidator::new(
                store.clone(),
                signer,
                scan_cooldown,
            )),
            store,
            clock,
            token_ttl,
        }
    }
}

/// Build the HTTP router.
///
/// # Routes
///
/// - `GET /health` (public)
/// - `GET|POST /api/v1/facilities`
/// - `GET /api/v1/facilities/{id}`
/// - `POST /api/v1/facilities/{id}/qr/rotate`
/// - `POST /api/v1/attendance/mark`
pub fn router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        // Facility routes
        .route(
            "/api/v1/facilities",
            get(handlers::facilities::list_facilities).post(handlers::facilities::create_facility),
        )
        .route(
            "/api/v1/facilities/{id}",
            get(handlers::facilities::get_facility),
        )
        .route(
            "/api/v1/facilities/{id}/qr/rotate",
            post(handlers::facilities::rotate_qr_token),
        )
        // Attendance routes
        .route(
            "/api/v1/attendance/mark",
            post(handlers::attendance::mark_attendance),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        // Scanner and display clients are browser apps served from other origins
        .layer(CorsLayer::permissive())
        .with_state(state)
}
