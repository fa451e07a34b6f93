/// Booking endpoints
///
/// Creation runs the interval conflict check; cancellation coordinates the
/// refund when a payment already succeeded.
///
/// # Endpoints
///
/// - `GET    /v1/bookings` - List all bookings (admin)
/// - `GET    /v1/bookings/me` - List caller's bookings
/// - `POST   /v1/bookings` - Create a booking
/// - `DELETE /v1/bookings/:id/cancel` - Cancel a booking, refunding if needed
///
/// # Cancellation protocol
///
/// The refund call goes to the gateway *before* any local state changes and
/// outside any open transaction. Only a definitive success response commits
/// the local pair (payment `refunded`, booking `cancelled`) — atomically, in
/// one transaction. A gateway failure or timeout leaves everything untouched
/// and answers 502 so the caller can retry.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use fieldbook_shared::{
    auth::AuthContext,
    models::{Booking, BookingStatus, CreateBooking, Payment, PaymentStatus},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create booking request
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Field to reserve
    pub field_id: Uuid,

    /// Interval start (inclusive)
    pub start_time: DateTime<Utc>,

    /// Interval end (exclusive)
    pub end_time: DateTime<Utc>,

    /// Optional freeform notes
    pub notes: Option<String>,
}

/// Cancellation response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    /// The booking after cancellation
    pub booking: Booking,

    /// Refund receipt, present when a gateway refund happened in this call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,

    /// Gateway-reported refund status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_status: Option<String>,
}

/// List all bookings (admin only)
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Booking>>> {
    ctx.require_admin()?;
    let bookings = Booking::list(&state.db).await?;
    Ok(Json(bookings))
}

/// List the caller's own bookings
pub async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Booking>>> {
    let bookings = Booking::list_by_user(&state.db, ctx.user_id).await?;
    Ok(Json(bookings))
}

/// Create a booking
///
/// The requested interval is validated, then checked for conflicts against
/// non-cancelled bookings on the same field inside a per-field serialized
/// transaction. Under concurrent overlapping requests exactly one wins.
///
/// # Errors
///
/// - `400 Bad Request`: Empty interval or start in the past
/// - `404 Not Found`: Unknown field
/// - `409 Conflict`: Interval overlaps an existing booking
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<Json<Booking>> {
    let booking = Booking::create_checked(
        &state.db,
        CreateBooking {
            field_id: req.field_id,
            user_id: ctx.user_id,
            start_time: req.start_time,
            end_time: req.end_time,
            notes: req.notes,
        },
    )
    .await?;

    tracing::info!(
        booking_id = %booking.id,
        field_id = %booking.field_id,
        "Booking created"
    );

    Ok(Json(booking))
}

/// Cancel a booking, refunding its payment if one succeeded
///
/// Owners cancel their own bookings; admins can cancel any.
///
/// # Errors
///
/// - `400 Bad Request`: Booking already cancelled
/// - `404 Not Found`: No such booking visible to the caller
/// - `502 Bad Gateway`: Refund call failed or timed out; nothing changed
///   locally, safe to retry
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CancelResponse>> {
    // Admins see every booking; everyone else only their own. A foreign
    // booking answers 404 rather than 403, so IDs don't leak.
    let booking = if ctx.role.is_admin() {
        Booking::find_by_id(&state.db, id).await?
    } else {
        Booking::find_by_id_for_user(&state.db, id, ctx.user_id).await?
    }
    .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    if booking.status == BookingStatus::Cancelled {
        return Err(ApiError::BadRequest("Booking already cancelled".to_string()));
    }

    let (refund_id, refund_status) = match Payment::latest_succeeded(&state.db, booking.id).await? {
        Some(payment) => {
            // Refund first, commit locally only on definitive success.
            let receipt = state
                .gateway
                .refund(&payment.external_ref)
                .await
                .map_err(ApiError::from)?;

            Payment::finalize_refund(&state.db, payment.id, booking.id).await?;

            tracing::info!(
                booking_id = %booking.id,
                payment_id = %payment.id,
                refund_id = %receipt.refund_id,
                "Booking cancelled with refund"
            );

            (Some(receipt.refund_id), Some(receipt.status))
        }
        None => {
            // A previous attempt may have refunded the payment but failed
            // before cancelling the booking. That state is recovered here
            // locally, without another gateway call.
            let already_refunded = Payment::list_by_booking(&state.db, booking.id)
                .await?
                .iter()
                .any(|p| p.status == PaymentStatus::Refunded);

            if already_refunded {
                tracing::warn!(
                    booking_id = %booking.id,
                    "Recovering refunded payment with uncancelled booking"
                );
            }

            // An open checkout session must not settle against a cancelled
            // booking, so any still-pending payment is voided here. A later
            // completion event for it then falls through as a no-op.
            let voided = Payment::void_pending_by_booking(&state.db, booking.id).await?;
            if voided > 0 {
                tracing::info!(
                    booking_id = %booking.id,
                    count = voided,
                    "Voided pending payments on cancellation"
                );
            }

            Booking::cancel(&state.db, booking.id).await?;
            (None, None)
        }
    };

    let booking = Booking::find_by_id(&state.db, booking.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Booking not found".to_string()))?;

    Ok(Json(CancelResponse {
        booking,
        refund_id,
        refund_status,
    }))
}
