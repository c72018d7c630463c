//! QR Attendance Service - Main Application Entry Point
//!
//! REST API that records physical attendance. Facilities display a rotating
//! QR code; students scan it and the scan is admitted if the code is still
//! valid and the student has not just been credited at that facility.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with SHA-256 hashing
//! - **QR tokens**: HMAC-SHA256 signed, time-bounded, rotated on demand
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load and validate configuration (a bad signing key aborts startup)
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod app;
mod clock;
mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{clock::SystemClock, services::qr_token::QrTokenSigner, store::postgres::PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    let signer = QrTokenSigner::new(config.qr_signing_key.as_bytes())?;
    tracing::info!(
        token_ttl_secs = config.qr_token_ttl_secs,
        scan_cooldown_secs = config.scan_cooldown_secs,
        "Configuration loaded"
    );

    let pool = db::create_pool(
        &config.database_url,
        config.db_max_connections,
        config.store_timeout(),
    )
    .await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let state = app::AppState::new(
        Arc::new(PgStore::new(pool, config.store_timeout())),
        signer,
        Arc::new(SystemClock),
        config.token_ttl(),
        config.scan_cooldown(),
    );

    let app = app::router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
