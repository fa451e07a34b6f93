/// Authentication endpoints
///
/// This module provides user authentication endpoints:
/// - Registration
/// - Login
/// - Token refresh (with rotation)
/// - Logout (refresh revocation + access-token blacklist)
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register new user
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Rotate refresh token, get new token pair
/// - `POST /v1/auth/logout` - Revoke both tokens

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, http::HeaderMap, Json};
use fieldbook_shared::{
    auth::{password, tokens},
    models::{CreateUser, User, UserRole},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (validated for strength)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Display name
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Token pair returned by register, login, and refresh
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// User ID
    pub user_id: String,

    /// Short-lived access token
    pub access_token: String,

    /// Single-use refresh token
    pub refresh_token: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Logout request
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    /// Refresh token to revoke
    pub refresh_token: String,
}

/// Converts `validator` failures into the 422 detail format
fn validation_errors(e: validator::ValidationErrors) -> ApiError {
    let errors: Vec<ValidationErrorDetail> = e
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();
    ApiError::ValidationError(errors)
}

/// Register a new user
///
/// Creates a user account with the `user` role and returns a token pair.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "SecureP4ss",
///   "name": "Jamie Doe"
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate().map_err(validation_errors)?;

    password::validate_password_strength(&req.password).map_err(|e| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message: e,
        }])
    })?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            name: req.name,
            role: UserRole::User,
        },
    )
    .await?;

    let (access_token, _) = state.signer.issue(user.id, user.role)?;
    let refresh_token = state.sessions.issue_refresh(user.id).await?;

    Ok(Json(TokenResponse {
        user_id: user.id.to_string(),
        access_token,
        refresh_token,
    }))
}

/// Login endpoint
///
/// Authenticates a user and returns a token pair.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials (same answer for unknown email
///   and wrong password)
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate().map_err(validation_errors)?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    let valid = password::verify_password(&req.password, &user.password_hash)?;
    if !valid {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let (access_token, _) = state.signer.issue(user.id, user.role)?;
    let refresh_token = state.sessions.issue_refresh(user.id).await?;

    Ok(Json(TokenResponse {
        user_id: user.id.to_string(),
        access_token,
        refresh_token,
    }))
}

/// Token refresh endpoint
///
/// Exchanges a refresh token for a fresh token pair. The presented token is
/// consumed atomically; a second use of the same token fails with 401.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired, or already-used refresh token
/// - `503 Service Unavailable`: Token store unreachable
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let (user_id, new_refresh) = state.sessions.rotate_refresh(&req.refresh_token).await?;

    // The role may have changed since the last access token was issued, so
    // it is re-read rather than carried over.
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    let (access_token, _) = state.signer.issue(user.id, user.role)?;

    Ok(Json(TokenResponse {
        user_id: user.id.to_string(),
        access_token,
        refresh_token: new_refresh,
    }))
}

/// Logout endpoint
///
/// Deletes the refresh token and blacklists the presented access token for
/// its remaining lifetime, so both credentials die immediately rather than
/// at natural expiry. Idempotent: logging out twice succeeds.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing or invalid access token
/// - `503 Service Unavailable`: Token store unreachable
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LogoutRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    // The auth layer already validated this token; re-read it here for the
    // signature and remaining TTL.
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let claims = state.signer.verify(token)?;

    state.sessions.revoke_refresh(&req.refresh_token).await?;

    if let Some(remaining) = claims.remaining() {
        state
            .sessions
            .blacklist_access(tokens::token_signature(token), remaining)
            .await?;
    }

    Ok(Json(serde_json::json!({ "message": "Logged out" })))
}
