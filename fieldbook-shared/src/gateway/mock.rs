/// Scripted in-memory payment gateway for tests
///
/// Behaves like a well-behaved provider by default: every checkout session
/// opens, every refund succeeds, and events are accepted without a
/// signature. Failure modes are opt-in via the `set_fail_*` switches so
/// tests can script an outage for a single call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::{
    CheckoutRequest, CheckoutSession, GatewayError, GatewayEvent, GatewayEventKind,
    PaymentGateway, RefundReceipt,
};

/// In-memory gateway with scriptable failures
#[derive(Default)]
pub struct MockGateway {
    fail_checkout: AtomicBool,
    fail_refunds: AtomicBool,
    /// Call log, one entry per gateway call, e.g. `refund:cs_xyz`
    calls: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, `create_checkout_session` fails with `Rejected`
    pub fn set_fail_checkout(&self, fail: bool) {
        self.fail_checkout.store(fail, Ordering::SeqCst);
    }

    /// When set, `refund` fails with `Timeout`
    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    /// Builds an unsigned completion event payload for a session
    ///
    /// Pairs with this gateway's `verify_event`, which skips signature
    /// checks. Tests post this to the notification endpoint directly.
    pub fn completion_payload(external_ref: &str) -> Vec<u8> {
        serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": { "id": external_ref } }
        })
        .to_string()
        .into_bytes()
    }

    /// Builds an unsigned expiry event payload for a session
    pub fn expiry_payload(external_ref: &str) -> Vec<u8> {
        serde_json::json!({
            "type": "checkout.session.expired",
            "data": { "object": { "id": external_ref } }
        })
        .to_string()
        .into_bytes()
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        self.record(format!("checkout:{}", request.booking_id));

        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected(
                "Scripted checkout failure".to_string(),
            ));
        }

        let external_ref = format!("mock_sess_{}", Uuid::new_v4().simple());
        Ok(CheckoutSession {
            url: format!("https://mock.gateway/pay/{}", external_ref),
            external_ref,
        })
    }

    async fn refund(&self, external_ref: &str) -> Result<RefundReceipt, GatewayError> {
        self.record(format!("refund:{}", external_ref));

        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout(std::time::Duration::from_secs(0)));
        }

        Ok(RefundReceipt {
            refund_id: format!("mock_re_{}", Uuid::new_v4().simple()),
            status: "succeeded".to_string(),
        })
    }

    fn verify_event(
        &self,
        payload: &[u8],
        _signature_header: &str,
    ) -> Result<GatewayEvent, GatewayError> {
        let envelope: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| GatewayError::MalformedEvent(e.to_string()))?;

        let kind = match envelope["type"].as_str().unwrap_or("") {
            "checkout.session.completed" => GatewayEventKind::CheckoutCompleted,
            "checkout.session.expired" => GatewayEventKind::CheckoutExpired,
            "checkout.session.async_payment_failed" => GatewayEventKind::PaymentFailed,
            _ => GatewayEventKind::Other,
        };

        let external_ref = envelope["data"]["object"]["id"]
            .as_str()
            .unwrap_or("")
            .to_string();

        Ok(GatewayEvent { kind, external_ref })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            booking_id: Uuid::new_v4(),
            description: "Field booking".to_string(),
            amount_minor: 5000,
            currency: "usd".to_string(),
        }
    }

    #[tokio::test]
    async fn test_checkout_produces_unique_refs() {
        let gw = MockGateway::new();
        let a = gw.create_checkout_session(request()).await.unwrap();
        let b = gw.create_checkout_session(request()).await.unwrap();
        assert_ne!(a.external_ref, b.external_ref);
        assert!(a.url.contains(&a.external_ref));
    }

    #[tokio::test]
    async fn test_scripted_refund_failure() {
        let gw = MockGateway::new();
        gw.set_fail_refunds(true);
        assert!(matches!(
            gw.refund("mock_sess_x").await,
            Err(GatewayError::Timeout(_))
        ));

        gw.set_fail_refunds(false);
        let receipt = gw.refund("mock_sess_x").await.unwrap();
        assert_eq!(receipt.status, "succeeded");
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let gw = MockGateway::new();
        let session = gw.create_checkout_session(request()).await.unwrap();
        let _ = gw.refund(&session.external_ref).await;

        let calls = gw.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("checkout:"));
        assert_eq!(calls[1], format!("refund:{}", session.external_ref));
    }

    #[test]
    fn test_verify_event_parses_payloads() {
        let gw = MockGateway::new();

        let event = gw
            .verify_event(&MockGateway::completion_payload("cs_1"), "")
            .unwrap();
        assert_eq!(event.kind, GatewayEventKind::CheckoutCompleted);
        assert_eq!(event.external_ref, "cs_1");

        let event = gw
            .verify_event(&MockGateway::expiry_payload("cs_2"), "")
            .unwrap();
        assert_eq!(event.kind, GatewayEventKind::CheckoutExpired);
    }
}
