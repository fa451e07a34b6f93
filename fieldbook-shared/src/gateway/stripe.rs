/// Stripe-backed payment gateway
///
/// Talks to the Stripe REST API directly over HTTPS with form-encoded
/// requests. Three endpoints are used:
///
/// - `POST /v1/checkout/sessions` to open a hosted checkout session
/// - `GET  /v1/checkout/sessions/{id}` to resolve the payment intent
/// - `POST /v1/refunds` to refund a completed payment
///
/// Webhook notifications are authenticated with the `Stripe-Signature`
/// scheme: the header carries a timestamp `t` and an HMAC-SHA256 of
/// `"{t}.{payload}"` under the endpoint's signing secret. Events older than
/// five minutes are rejected to limit replay.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

use super::{
    CheckoutRequest, CheckoutSession, GatewayError, GatewayEvent, GatewayEventKind,
    PaymentGateway, RefundReceipt,
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum accepted age of a signed webhook event
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe gateway configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: String,

    /// Webhook endpoint signing secret (`whsec_...`)
    pub webhook_secret: String,

    /// Redirect URL after successful payment
    pub success_url: String,

    /// Redirect URL after abandoned payment
    pub cancel_url: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

/// Payment gateway backed by the Stripe REST API
pub struct StripeGateway {
    http: reqwest::Client,
    config: StripeConfig,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    #[serde(default)]
    id: String,
}

impl StripeGateway {
    /// Creates a gateway from configuration
    pub fn new(config: StripeConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        Self {
            http: reqwest::Client::new(),
            config,
            timeout,
        }
    }

    /// Sends a request and parses the JSON response
    ///
    /// The timeout covers the whole exchange, body read included, so a
    /// provider that answers headers quickly but trickles the body cannot
    /// hold a caller past the deadline.
    async fn request_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let exchange = async {
            let response = builder
                .send()
                .await
                .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

            if response.status().is_success() {
                return response
                    .json::<T>()
                    .await
                    .map_err(|e| GatewayError::RequestFailed(e.to_string()));
            }

            let status = response.status();
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status));

            Err(GatewayError::Rejected(message))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout))?
    }

    async fn fetch_session(&self, session_id: &str) -> Result<SessionResponse, GatewayError> {
        let request = self
            .http
            .get(format!("{STRIPE_API_BASE}/checkout/sessions/{session_id}"))
            .bearer_auth(&self.config.secret_key);

        self.request_json(request).await
    }
}

#[async_trait::async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &str {
        "stripe"
    }

    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let amount = request.amount_minor.to_string();
        let booking_id = request.booking_id.to_string();

        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", &request.currency),
            ("line_items[0][price_data][unit_amount]", &amount),
            (
                "line_items[0][price_data][product_data][name]",
                &request.description,
            ),
            ("success_url", &self.config.success_url),
            ("cancel_url", &self.config.cancel_url),
            ("metadata[booking_id]", &booking_id),
        ];

        let req = self
            .http
            .post(format!("{STRIPE_API_BASE}/checkout/sessions"))
            .bearer_auth(&self.config.secret_key)
            .form(&form);

        let session: SessionResponse = self.request_json(req).await?;

        let url = session.url.ok_or_else(|| {
            GatewayError::RequestFailed("Checkout session has no URL".to_string())
        })?;

        Ok(CheckoutSession {
            external_ref: session.id,
            url,
        })
    }

    async fn refund(&self, external_ref: &str) -> Result<RefundReceipt, GatewayError> {
        // The session holds the payment intent the refund targets.
        let session = self.fetch_session(external_ref).await?;
        let payment_intent = session.payment_intent.ok_or_else(|| {
            GatewayError::Rejected("Checkout session has no payment intent".to_string())
        })?;

        let form = [("payment_intent", payment_intent.as_str())];
        let req = self
            .http
            .post(format!("{STRIPE_API_BASE}/refunds"))
            .bearer_auth(&self.config.secret_key)
            .form(&form);

        let refund: RefundResponse = self.request_json(req).await?;

        Ok(RefundReceipt {
            refund_id: refund.id,
            status: refund.status,
        })
    }

    fn verify_event(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<GatewayEvent, GatewayError> {
        let (timestamp, signature) = parse_signature_header(signature_header)
            .ok_or(GatewayError::InvalidSignature)?;

        let age = chrono::Utc::now().timestamp() - timestamp;
        if age.abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(GatewayError::InvalidSignature);
        }

        verify_signature(self.config.webhook_secret.as_bytes(), timestamp, payload, &signature)?;

        parse_event(payload)
    }
}

/// Parses `t=<unix>,v1=<hex>` out of a Stripe-Signature header
fn parse_signature_header(header: &str) -> Option<(i64, String)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value.to_string()),
            _ => {}
        }
    }

    Some((timestamp?, signature?))
}

/// Verifies the HMAC-SHA256 over `"{timestamp}.{payload}"`
fn verify_signature(
    secret: &[u8],
    timestamp: i64,
    payload: &[u8],
    signature_hex: &str,
) -> Result<(), GatewayError> {
    let expected = hex::decode(signature_hex).map_err(|_| GatewayError::InvalidSignature)?;

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    mac.verify_slice(&expected)
        .map_err(|_| GatewayError::InvalidSignature)
}

/// Parses a verified payload into a [`GatewayEvent`]
fn parse_event(payload: &[u8]) -> Result<GatewayEvent, GatewayError> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| GatewayError::MalformedEvent(e.to_string()))?;

    let kind = match envelope.event_type.as_str() {
        "checkout.session.completed" => GatewayEventKind::CheckoutCompleted,
        "checkout.session.expired" => GatewayEventKind::CheckoutExpired,
        "checkout.session.async_payment_failed" => GatewayEventKind::PaymentFailed,
        _ => GatewayEventKind::Other,
    };

    Ok(GatewayEvent {
        kind,
        external_ref: envelope.data.object.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &[u8], timestamp: i64, payload: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn gateway() -> StripeGateway {
        StripeGateway::new(StripeConfig {
            secret_key: "sk_test_key".to_string(),
            webhook_secret: "whsec_test".to_string(),
            success_url: "https://example.com/success".to_string(),
            cancel_url: "https://example.com/cancel".to_string(),
            timeout_secs: 10,
        })
    }

    fn completion_payload(session_id: &str) -> Vec<u8> {
        serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": { "id": session_id } }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_parse_signature_header() {
        let (t, v1) = parse_signature_header("t=1700000000,v1=abcdef").unwrap();
        assert_eq!(t, 1700000000);
        assert_eq!(v1, "abcdef");

        assert!(parse_signature_header("v1=abcdef").is_none());
        assert!(parse_signature_header("t=1700000000").is_none());
        assert!(parse_signature_header("").is_none());
    }

    #[test]
    fn test_verify_event_valid_signature() {
        let gw = gateway();
        let payload = completion_payload("cs_test_123");
        let now = chrono::Utc::now().timestamp();
        let sig = sign(b"whsec_test", now, &payload);
        let header = format!("t={},v1={}", now, sig);

        let event = gw.verify_event(&payload, &header).unwrap();
        assert_eq!(event.kind, GatewayEventKind::CheckoutCompleted);
        assert_eq!(event.external_ref, "cs_test_123");
    }

    #[test]
    fn test_verify_event_bad_signature() {
        let gw = gateway();
        let payload = completion_payload("cs_test_123");
        let now = chrono::Utc::now().timestamp();
        let sig = sign(b"wrong_secret", now, &payload);
        let header = format!("t={},v1={}", now, sig);

        assert!(matches!(
            gw.verify_event(&payload, &header),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_event_tampered_payload() {
        let gw = gateway();
        let payload = completion_payload("cs_test_123");
        let now = chrono::Utc::now().timestamp();
        let sig = sign(b"whsec_test", now, &payload);
        let header = format!("t={},v1={}", now, sig);

        let tampered = completion_payload("cs_test_456");
        assert!(matches!(
            gw.verify_event(&tampered, &header),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn test_verify_event_stale_timestamp() {
        let gw = gateway();
        let payload = completion_payload("cs_test_123");
        let stale = chrono::Utc::now().timestamp() - SIGNATURE_TOLERANCE_SECS - 60;
        let sig = sign(b"whsec_test", stale, &payload);
        let header = format!("t={},v1={}", stale, sig);

        assert!(matches!(
            gw.verify_event(&payload, &header),
            Err(GatewayError::InvalidSignature)
        ));
    }

    #[test]
    fn test_parse_event_kinds() {
        let expired = serde_json::json!({
            "type": "checkout.session.expired",
            "data": { "object": { "id": "cs_1" } }
        })
        .to_string();
        let event = parse_event(expired.as_bytes()).unwrap();
        assert_eq!(event.kind, GatewayEventKind::CheckoutExpired);

        let failed = serde_json::json!({
            "type": "checkout.session.async_payment_failed",
            "data": { "object": { "id": "cs_2" } }
        })
        .to_string();
        let event = parse_event(failed.as_bytes()).unwrap();
        assert_eq!(event.kind, GatewayEventKind::PaymentFailed);

        let unknown = serde_json::json!({
            "type": "invoice.created",
            "data": { "object": { "id": "in_1" } }
        })
        .to_string();
        let event = parse_event(unknown.as_bytes()).unwrap();
        assert_eq!(event.kind, GatewayEventKind::Other);
    }

    #[test]
    fn test_parse_event_malformed() {
        assert!(matches!(
            parse_event(b"not json"),
            Err(GatewayError::MalformedEvent(_))
        ));
    }
}
