/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.

use crate::config::Config;
use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use fieldbook_shared::auth::{tokens, AuthContext, SessionError, SessionStore, TokenSigner};
use fieldbook_shared::gateway::PaymentGateway;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Refresh token and blacklist store
    pub sessions: SessionStore,

    /// Access token signer/verifier
    pub signer: TokenSigner,

    /// Payment gateway implementation
    pub gateway: Arc<dyn PaymentGateway>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(
        db: PgPool,
        sessions: SessionStore,
        signer: TokenSigner,
        gateway: Arc<dyn PaymentGateway>,
        config: Config,
    ) -> Self {
        Self {
            db,
            sessions,
            signer,
            gateway,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                       # Health check (public)
/// ├── /v1/
/// │   ├── /auth/
/// │   │   ├── POST /register        # Public
/// │   │   ├── POST /login           # Public
/// │   │   ├── POST /refresh         # Public (rotates the refresh token)
/// │   │   └── POST /logout          # Authenticated
/// │   ├── /fields/
/// │   │   ├── GET  /                # Public, with filters
/// │   │   ├── GET  /:id             # Public
/// │   │   ├── POST /                # Admin
/// │   │   ├── PUT  /:id             # Admin
/// │   │   └── DELETE /:id           # Admin
/// │   ├── /bookings/
/// │   │   ├── GET  /                # Admin
/// │   │   ├── GET  /me              # Authenticated
/// │   │   ├── POST /                # Authenticated
/// │   │   └── DELETE /:id/cancel    # Authenticated (owner or admin)
/// │   └── /payments/
/// │       ├── POST /checkout        # Authenticated
/// │       ├── POST /webhook         # Public, signature-verified
/// │       ├── GET  /                # Admin
/// │       ├── GET  /me              # Authenticated
/// │       └── GET  /:id             # Authenticated (owner or admin)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Authentication (per-route-group basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Auth routes: register/login/refresh are public, logout needs a token
    let auth_public = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let auth_protected = Router::new()
        .route("/logout", post(routes::auth::logout))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let auth_routes = auth_public.merge(auth_protected);

    // Field routes: browsing is public, mutation is admin-gated
    let field_public = Router::new()
        .route("/", get(routes::fields::list_fields))
        .route("/:id", get(routes::fields::get_field));

    let field_admin = Router::new()
        .route("/", post(routes::fields::create_field))
        .route("/:id", put(routes::fields::update_field))
        .route("/:id", delete(routes::fields::delete_field))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let field_routes = field_public.merge(field_admin);

    // Booking routes (all require authentication)
    let booking_routes = Router::new()
        .route("/", get(routes::bookings::list_bookings))
        .route("/me", get(routes::bookings::list_my_bookings))
        .route("/", post(routes::bookings::create_booking))
        .route("/:id/cancel", delete(routes::bookings::cancel_booking))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Payment routes: the webhook is public (signature-verified by the
    // gateway), everything else requires authentication
    let payment_protected = Router::new()
        .route("/checkout", post(routes::payments::create_checkout))
        .route("/", get(routes::payments::list_payments))
        .route("/me", get(routes::payments::list_my_payments))
        .route("/:id", get(routes::payments::get_payment))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let payment_routes = Router::new()
        .route("/webhook", post(routes::payments::webhook))
        .merge(payment_protected);

    // Build complete v1 API
    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/fields", field_routes)
        .nest("/bookings", booking_routes)
        .nest("/payments", payment_routes);

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Extracts the bearer token, checks it against the revocation blacklist,
/// verifies signature and expiry, then injects [`AuthContext`] into request
/// extensions.
///
/// The blacklist check degrades: when the token store is unreachable the
/// request proceeds on signature verification alone, so an outage of the
/// store never takes down stateless authentication.
async fn jwt_auth_layer(
    state: axum::extract::State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, crate::error::ApiError> {
    // Extract Authorization header
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            crate::error::ApiError::Unauthorized("Missing authorization header".to_string())
        })?;

    // Parse Bearer token
    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        crate::error::ApiError::BadRequest("Expected Bearer token".to_string())
    })?;

    // Revocation check, degrading on store outage
    let lookup = state
        .sessions
        .is_blacklisted(tokens::token_signature(token))
        .await;
    apply_blacklist_result(lookup)?;

    // Validate token
    let claims = state.signer.verify(token)?;

    // Insert into request extensions
    let auth_context = AuthContext::new(claims.sub, claims.role);
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Decides whether a request proceeds given the blacklist lookup result
///
/// A revoked token is rejected. An unreachable store is logged and the
/// request carries on under signature verification alone, so a store outage
/// never takes down stateless authentication.
fn apply_blacklist_result(
    lookup: Result<bool, SessionError>,
) -> Result<(), crate::error::ApiError> {
    match lookup {
        Ok(true) => Err(crate::error::ApiError::Unauthorized(
            "Token has been revoked".to_string(),
        )),
        Ok(false) => Ok(()),
        Err(SessionError::StoreUnavailable(msg)) => {
            tracing::warn!("Blacklist check skipped, token store unavailable: {}", msg);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_blacklisted_token_rejected() {
        let result = apply_blacklist_result(Ok(true));
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_clean_token_proceeds() {
        assert!(apply_blacklist_result(Ok(false)).is_ok());
    }

    #[test]
    fn test_store_outage_degrades_to_stateless_verification() {
        let result = apply_blacklist_result(Err(SessionError::StoreUnavailable(
            "connection refused".to_string(),
        )));
        assert!(result.is_ok());
    }

    #[test]
    fn test_other_session_errors_propagate() {
        let result = apply_blacklist_result(Err(SessionError::InvalidCredential));
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}
