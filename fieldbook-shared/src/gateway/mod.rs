/// Payment gateway abstraction
///
/// The rest of the system consumes payments as an abstract capability: open
/// a checkout session, refund a completed one, and turn a provider-signed
/// notification into a validated [`GatewayEvent`]. The wire format of the
/// provider is an implementation detail of the gateway.
///
/// # Implementations
///
/// - [`StripeGateway`]: talks to the Stripe REST API over HTTPS
/// - [`MockGateway`]: scripted in-memory gateway for tests
///
/// # Amount convention
///
/// Every amount crossing this boundary is an integer in minor currency
/// units (cents for USD). No multiplication or division happens at the
/// boundary; callers and implementations share the same unit.
///
/// # Failure semantics
///
/// Calls carry an explicit timeout. A timeout is reported as
/// [`GatewayError::Timeout`] and must be treated as failure by callers —
/// never as success. Refund callers in particular only commit local state
/// after a definitive success response.

pub mod mock;
pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub use mock::MockGateway;
pub use stripe::StripeGateway;

/// Gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request could not be sent or the response could not be read
    #[error("Payment gateway request failed: {0}")]
    RequestFailed(String),

    /// The call exceeded its timeout; outcome unknown, treated as failure
    #[error("Payment gateway timed out after {0:?}")]
    Timeout(Duration),

    /// The gateway answered with an error for this request
    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),

    /// Notification signature did not verify
    #[error("Invalid event signature")]
    InvalidSignature,

    /// Notification payload could not be parsed
    #[error("Malformed event payload: {0}")]
    MalformedEvent(String),
}

/// Request to open a checkout session
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Booking being paid for (carried as session metadata)
    pub booking_id: Uuid,

    /// Line item description shown to the payer
    pub description: String,

    /// Amount in minor currency units
    pub amount_minor: i64,

    /// ISO currency code (lowercase)
    pub currency: String,
}

/// An open checkout session at the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Gateway session identifier; the local payment is keyed by this
    pub external_ref: String,

    /// URL the client is redirected to in order to pay
    pub url: String,
}

/// Outcome of a refund call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    /// Gateway refund identifier
    pub refund_id: String,

    /// Gateway-reported refund status
    pub status: String,
}

/// Kind of a validated gateway notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEventKind {
    /// Checkout completed; the payment succeeded
    CheckoutCompleted,

    /// Checkout session expired without payment
    CheckoutExpired,

    /// Asynchronous payment failed
    PaymentFailed,

    /// Any other event type; accepted and ignored
    Other,
}

/// A provider notification that passed signature verification
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    /// What happened
    pub kind: GatewayEventKind,

    /// Session reference the event is about (empty for `Other` events)
    pub external_ref: String,
}

/// Payment gateway capability
///
/// Implementations must be safe to share across request handlers.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Implementation name, used in logs
    fn name(&self) -> &str;

    /// Opens a checkout session for the given amount
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Refunds the payment behind a checkout session
    ///
    /// Only called for sessions whose payment previously completed.
    async fn refund(&self, external_ref: &str) -> Result<RefundReceipt, GatewayError>;

    /// Verifies a notification's signature and parses it into an event
    ///
    /// Returns [`GatewayError::InvalidSignature`] without inspecting the
    /// payload further when verification fails.
    fn verify_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<GatewayEvent, GatewayError>;
}
