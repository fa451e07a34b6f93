/// Payment endpoints: checkout, webhook reconciliation, and listing
///
/// # Endpoints
///
/// - `POST /v1/payments/checkout` - Open a checkout session for a booking
/// - `POST /v1/payments/webhook` - Provider event sink (signature-verified)
/// - `GET  /v1/payments` - List all payments (admin)
/// - `GET  /v1/payments/me` - List caller's payments
/// - `GET  /v1/payments/:id` - Get a payment (owner or admin)
///
/// # Reconciliation
///
/// The webhook is the source of truth for payment outcomes. Events are
/// delivered at least once, so every state change is a conditional update
/// that only fires while the payment is still `pending`; replays and
/// out-of-order deliveries fall through as no-ops.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Extension, Json,
};
use fieldbook_shared::{
    auth::AuthContext,
    gateway::{CheckoutRequest, GatewayEventKind},
    models::{Booking, BookingStatus, CreatePayment, Field, Payment},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Checkout request
#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    /// Booking to pay for
    pub booking_id: Uuid,
}

/// Checkout response
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Local payment record ID
    pub payment_id: Uuid,

    /// Gateway session reference
    pub external_ref: String,

    /// URL the client is redirected to in order to pay
    pub url: String,
}

/// Open a checkout session for a booking
///
/// The booking must belong to the caller, still be `pending`, and have no
/// active payment. The local `pending` payment is recorded keyed by the
/// gateway session ID, which later reconciles the webhook event.
///
/// # Errors
///
/// - `400 Bad Request`: Booking is not `pending`
/// - `404 Not Found`: No such booking owned by the caller
/// - `409 Conflict`: An active payment already exists for this booking
/// - `502 Bad Gateway`: Gateway call failed or timed out
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CheckoutBody>,
) -> ApiResult<Json<CheckoutResponse>> {
    let booking = Booking::find_by_id_for_user(&state.db, req.booking_id, ctx.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    if booking.status != BookingStatus::Pending {
        return Err(ApiError::BadRequest(
            "Only pending bookings can be paid for".to_string(),
        ));
    }

    if Payment::has_active(&state.db, booking.id).await? {
        return Err(ApiError::Conflict(
            "An active payment already exists for this booking".to_string(),
        ));
    }

    let field = Field::find_by_id(&state.db, booking.field_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Field not found".to_string()))?;

    let session = state
        .gateway
        .create_checkout_session(CheckoutRequest {
            booking_id: booking.id,
            description: format!("Booking for {}", field.name),
            amount_minor: field.price_minor,
            currency: state.config.gateway.currency.clone(),
        })
        .await?;

    let payment = Payment::create(
        &state.db,
        CreatePayment {
            booking_id: booking.id,
            amount_minor: field.price_minor,
            currency: state.config.gateway.currency.clone(),
            external_ref: session.external_ref.clone(),
        },
    )
    .await?;

    tracing::info!(
        booking_id = %booking.id,
        payment_id = %payment.id,
        external_ref = %session.external_ref,
        "Checkout session opened"
    );

    Ok(Json(CheckoutResponse {
        payment_id: payment.id,
        external_ref: session.external_ref,
        url: session.url,
    }))
}

/// Provider webhook sink
///
/// Verifies the provider signature before reading anything else from the
/// payload; an invalid signature answers 400 with no state change. Valid
/// events reconcile the matching payment:
///
/// - completion: payment `pending → succeeded`, booking confirmed
/// - expiry / failure: payment `pending → failed`, booking stays `pending`
/// - anything else: acknowledged and ignored
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let event = state.gateway.verify_event(&body, signature)?;

    match event.kind {
        GatewayEventKind::CheckoutCompleted => {
            // Payment and booking settle in one transaction; a replay that
            // finds the pair only half-settled finishes the job.
            match Payment::reconcile_completion(&state.db, &event.external_ref).await? {
                Some(booking_id) => {
                    tracing::info!(
                        external_ref = %event.external_ref,
                        booking_id = %booking_id,
                        "Payment succeeded, booking confirmed"
                    );
                }
                None => {
                    // Unknown reference or pure replay
                    tracing::debug!(
                        external_ref = %event.external_ref,
                        "Completion event did not transition any payment"
                    );
                }
            }
        }
        GatewayEventKind::CheckoutExpired | GatewayEventKind::PaymentFailed => {
            let transitioned = Payment::mark_failed_by_ref(&state.db, &event.external_ref).await?;
            if transitioned {
                tracing::info!(
                    external_ref = %event.external_ref,
                    "Payment failed, booking remains pending"
                );
            }
        }
        GatewayEventKind::Other => {}
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

/// List all payments (admin only)
pub async fn list_payments(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Payment>>> {
    ctx.require_admin()?;
    let payments = Payment::list(&state.db).await?;
    Ok(Json(payments))
}

/// List the caller's own payments
pub async fn list_my_payments(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Payment>>> {
    let payments = Payment::list_by_user(&state.db, ctx.user_id).await?;
    Ok(Json(payments))
}

/// Get a single payment (owner or admin)
pub async fn get_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    let payment = Payment::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;

    if !ctx.role.is_admin() {
        let owns = Booking::find_by_id_for_user(&state.db, payment.booking_id, ctx.user_id)
            .await?
            .is_some();
        if !owns {
            return Err(ApiError::NotFound("Payment not found".to_string()));
        }
    }

    Ok(Json(payment))
}
