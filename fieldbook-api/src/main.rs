//! # FieldBook API Server
//!
//! HTTP server for field reservations: authentication with revocable
//! sessions, conflict-checked booking creation, checkout and webhook
//! reconciliation against the payment gateway, and refund-coordinated
//! cancellation.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p fieldbook-api
//! ```

use std::sync::Arc;

use fieldbook_api::{
    app::{build_router, AppState},
    config::Config,
};
use fieldbook_shared::{
    auth::{SessionStore, TokenSigner},
    db::{create_pool, run_migrations, DatabaseConfig},
    gateway::stripe::{StripeConfig, StripeGateway},
    redis::{RedisClient, RedisConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldbook_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "FieldBook API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    // Database
    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;
    run_migrations(&pool).await?;

    // Token store
    let redis = RedisClient::new(RedisConfig {
        url: config.redis.url.clone(),
        command_timeout_secs: 5,
    })
    .await?;
    let sessions = SessionStore::new(&redis, config.auth.refresh_ttl_days);

    // Access tokens
    let signer = TokenSigner::new(&config.auth.jwt_secret, config.auth.access_ttl_minutes);

    // Payment gateway
    let gateway = Arc::new(StripeGateway::new(StripeConfig {
        secret_key: config.gateway.secret_key.clone(),
        webhook_secret: config.gateway.webhook_secret.clone(),
        success_url: config.gateway.success_url.clone(),
        cancel_url: config.gateway.cancel_url.clone(),
        timeout_secs: config.gateway.timeout_secs,
    }));

    let bind_address = config.bind_address();
    let state = AppState::new(pool, sessions, signer, gateway, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
