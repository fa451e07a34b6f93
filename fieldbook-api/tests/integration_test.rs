/// Integration tests for the FieldBook API
///
/// These tests verify the full system works end-to-end:
/// - Booking creation with conflict detection
/// - Concurrent creation with a single winner
/// - Checkout and webhook reconciliation (with replay)
/// - Refund-coordinated cancellation and its failure atomicity
/// - Refresh token rotation
/// - Admin gating
///
/// All tests require a local Postgres and Redis and are `#[ignore]`d; run
/// them with `cargo test -- --ignored`.

mod common;

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use common::TestContext;
use fieldbook_shared::gateway::MockGateway;
use fieldbook_shared::models::{
    Booking, BookingError, BookingStatus, CreateBooking, Payment, PaymentStatus,
};
use serde_json::json;
use uuid::Uuid;

fn slot(hour: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, hour, 0, 0).unwrap()
}

fn booking_body(field_id: Uuid, start_hour: u32, end_hour: u32) -> serde_json::Value {
    json!({
        "field_id": field_id,
        "start_time": slot(start_hour).to_rfc3339(),
        "end_time": slot(end_hour).to_rfc3339(),
    })
}

/// Books a field via the API and returns the booking ID
async fn book(ctx: &TestContext, field_id: Uuid, start_hour: u32, end_hour: u32) -> Uuid {
    let (status, body) = ctx
        .request(
            "POST",
            "/v1/bookings",
            Some(&ctx.auth_header()),
            Some(booking_body(field_id, start_hour, end_hour)),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "booking failed: {}", body);
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

/// Opens a checkout session via the API and returns the session reference
async fn checkout(ctx: &TestContext, booking_id: Uuid) -> String {
    let (status, body) = ctx
        .request(
            "POST",
            "/v1/payments/checkout",
            Some(&ctx.auth_header()),
            Some(json!({ "booking_id": booking_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "checkout failed: {}", body);
    body["external_ref"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_booking_overlap_rejected() {
    let ctx = TestContext::new().await.unwrap();
    let field = common::create_test_field(&ctx, 5000).await.unwrap();

    // 10:00-12:00 books fine
    book(&ctx, field.id, 10, 12).await;

    // 11:00-13:00 overlaps
    let (status, body) = ctx
        .request(
            "POST",
            "/v1/bookings",
            Some(&ctx.auth_header()),
            Some(booking_body(field.id, 11, 13)),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    // 12:00-13:00 touches the first interval's end; half-open, no conflict
    book(&ctx, field.id, 12, 13).await;

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_invalid_intervals_rejected() {
    let ctx = TestContext::new().await.unwrap();
    let field = common::create_test_field(&ctx, 5000).await.unwrap();

    // Empty interval
    let (status, _) = ctx
        .request(
            "POST",
            "/v1/bookings",
            Some(&ctx.auth_header()),
            Some(booking_body(field.id, 12, 12)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Start in the past
    let (status, _) = ctx
        .request(
            "POST",
            "/v1/bookings",
            Some(&ctx.auth_header()),
            Some(json!({
                "field_id": field.id,
                "start_time": "2020-01-01T10:00:00Z",
                "end_time": "2020-01-01T12:00:00Z",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown field
    let (status, _) = ctx
        .request(
            "POST",
            "/v1/bookings",
            Some(&ctx.auth_header()),
            Some(booking_body(Uuid::new_v4(), 10, 12)),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_concurrent_bookings_single_winner() {
    let ctx = TestContext::new().await.unwrap();
    let field = common::create_test_field(&ctx, 5000).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = ctx.db.clone();
        let data = CreateBooking {
            field_id: field.id,
            user_id: ctx.user.id,
            start_time: slot(14),
            end_time: slot(16),
            notes: None,
        };
        handles.push(tokio::spawn(async move {
            Booking::create_checked(&db, data).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(BookingError::SlotTaken) => conflicts += 1,
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_checkout_completion_confirms_booking() {
    let ctx = TestContext::new().await.unwrap();
    let field = common::create_test_field(&ctx, 7500).await.unwrap();
    let booking_id = book(&ctx, field.id, 8, 9).await;

    let external_ref = checkout(&ctx, booking_id).await;

    // A second checkout while the first payment is pending conflicts
    let (status, _) = ctx
        .request(
            "POST",
            "/v1/payments/checkout",
            Some(&ctx.auth_header()),
            Some(json!({ "booking_id": booking_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Completion event reconciles payment and confirms the booking
    let status = ctx
        .post_webhook(MockGateway::completion_payload(&external_ref))
        .await;
    assert_eq!(status, StatusCode::OK);

    let payment = Payment::find_by_external_ref(&ctx.db, &external_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert_eq!(payment.amount_minor, 7500);

    let booking = Booking::find_by_id(&ctx.db, booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    // Replayed event is a no-op
    let status = ctx
        .post_webhook(MockGateway::completion_payload(&external_ref))
        .await;
    assert_eq!(status, StatusCode::OK);

    let booking = Booking::find_by_id(&ctx.db, booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_completion_replay_repairs_half_settled_booking() {
    let ctx = TestContext::new().await.unwrap();
    let field = common::create_test_field(&ctx, 6000).await.unwrap();
    let booking_id = book(&ctx, field.id, 9, 10).await;

    let external_ref = checkout(&ctx, booking_id).await;

    // Simulate a crash between settling the payment and confirming the
    // booking: the payment is already succeeded, the booking still pending.
    sqlx::query("UPDATE payments SET status = 'succeeded' WHERE external_ref = $1")
        .bind(&external_ref)
        .execute(&ctx.db)
        .await
        .unwrap();

    let booking = Booking::find_by_id(&ctx.db, booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);

    // The provider redelivers the event; the replay finishes the settlement.
    let status = ctx
        .post_webhook(MockGateway::completion_payload(&external_ref))
        .await;
    assert_eq!(status, StatusCode::OK);

    let booking = Booking::find_by_id(&ctx.db, booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let payment = Payment::find_by_external_ref(&ctx.db, &external_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_cancel_voids_open_checkout() {
    let ctx = TestContext::new().await.unwrap();
    let field = common::create_test_field(&ctx, 5000).await.unwrap();
    let booking_id = book(&ctx, field.id, 13, 14).await;

    // Checkout opened but never completed
    let external_ref = checkout(&ctx, booking_id).await;

    let (status, body) = ctx
        .request(
            "DELETE",
            &format!("/v1/bookings/{}/cancel", booking_id),
            Some(&ctx.auth_header()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["refund_id"].is_null());

    // The open payment was voided along with the booking
    let payment = Payment::find_by_external_ref(&ctx.db, &external_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    // A late completion event for the voided session changes nothing
    let status = ctx
        .post_webhook(MockGateway::completion_payload(&external_ref))
        .await;
    assert_eq!(status, StatusCode::OK);

    let payment = Payment::find_by_external_ref(&ctx.db, &external_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    let booking = Booking::find_by_id(&ctx.db, booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_expiry_event_fails_payment_keeps_booking_pending() {
    let ctx = TestContext::new().await.unwrap();
    let field = common::create_test_field(&ctx, 5000).await.unwrap();
    let booking_id = book(&ctx, field.id, 6, 7).await;

    let external_ref = checkout(&ctx, booking_id).await;

    let status = ctx
        .post_webhook(MockGateway::expiry_payload(&external_ref))
        .await;
    assert_eq!(status, StatusCode::OK);

    let payment = Payment::find_by_external_ref(&ctx.db, &external_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    // Booking is still pending, so a fresh checkout is allowed
    let booking = Booking::find_by_id(&ctx.db, booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    checkout(&ctx, booking_id).await;

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_cancel_with_refund_atomicity() {
    let ctx = TestContext::new().await.unwrap();
    let field = common::create_test_field(&ctx, 9000).await.unwrap();
    let booking_id = book(&ctx, field.id, 17, 19).await;

    let external_ref = checkout(&ctx, booking_id).await;
    ctx.post_webhook(MockGateway::completion_payload(&external_ref))
        .await;

    // First attempt: the gateway refund fails, nothing changes locally
    ctx.gateway.set_fail_refunds(true);
    let (status, _) = ctx
        .request(
            "DELETE",
            &format!("/v1/bookings/{}/cancel", booking_id),
            Some(&ctx.auth_header()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let booking = Booking::find_by_id(&ctx.db, booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    let payment = Payment::find_by_external_ref(&ctx.db, &external_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);

    // Retry after the gateway recovers: refund goes through, both sides flip
    ctx.gateway.set_fail_refunds(false);
    let (status, body) = ctx
        .request(
            "DELETE",
            &format!("/v1/bookings/{}/cancel", booking_id),
            Some(&ctx.auth_header()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["refund_id"].as_str().unwrap().starts_with("mock_re_"));
    assert_eq!(body["booking"]["status"], "cancelled");

    let payment = Payment::find_by_external_ref(&ctx.db, &external_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Refunded);

    // Cancelling again is rejected
    let (status, _) = ctx
        .request(
            "DELETE",
            &format!("/v1/bookings/{}/cancel", booking_id),
            Some(&ctx.auth_header()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_cancel_unpaid_booking_needs_no_refund() {
    let ctx = TestContext::new().await.unwrap();
    let field = common::create_test_field(&ctx, 5000).await.unwrap();
    let booking_id = book(&ctx, field.id, 20, 21).await;

    let (status, body) = ctx
        .request(
            "DELETE",
            &format!("/v1/bookings/{}/cancel", booking_id),
            Some(&ctx.auth_header()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["refund_id"].is_null());
    assert_eq!(body["booking"]["status"], "cancelled");

    // No gateway call happened
    assert!(ctx.gateway.calls().iter().all(|c| !c.starts_with("refund:")));

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_refresh_rotation_rejects_reuse() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .request(
            "POST",
            "/v1/auth/register",
            None,
            Some(json!({
                "email": format!("rotate-{}@example.com", Uuid::new_v4()),
                "password": "test_password_1",
                "name": "Rotate Tester",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let first_refresh = body["refresh_token"].as_str().unwrap().to_string();

    // Rotation succeeds and issues a different token
    let (status, body) = ctx
        .request(
            "POST",
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": first_refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let second_refresh = body["refresh_token"].as_str().unwrap().to_string();
    assert_ne!(first_refresh, second_refresh);

    // The consumed token is dead
    let (status, _) = ctx
        .request(
            "POST",
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": first_refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The rotated-in token still works
    let (status, _) = ctx
        .request(
            "POST",
            "/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": second_refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_logout_revokes_access_token() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .request(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({
                "email": ctx.user.email,
                "password": "test_password_1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();
    let header = format!("Bearer {}", access);

    // Token works before logout
    let (status, _) = ctx
        .request("GET", "/v1/bookings/me", Some(&header), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx
        .request(
            "POST",
            "/v1/auth/logout",
            Some(&header),
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Blacklisted before natural expiry
    let (status, _) = ctx
        .request("GET", "/v1/bookings/me", Some(&header), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Postgres + Redis
async fn test_field_mutation_is_admin_gated() {
    let ctx = TestContext::new().await.unwrap();

    let body = json!({
        "name": format!("Gated Field {}", Uuid::new_v4()),
        "location": "North Side",
        "price_minor": 4500,
    });

    let (status, _) = ctx
        .request("POST", "/v1/fields", Some(&ctx.auth_header()), Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = ctx
        .request("POST", "/v1/fields", Some(&ctx.admin_header()), Some(body))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", created);

    // Browsing needs no token
    let (status, _) = ctx
        .request(
            "GET",
            &format!("/v1/fields/{}", created["id"].as_str().unwrap()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    ctx.cleanup().await.unwrap();
}
