//! Stripe adapter.
//!
//! Speaks the PaymentIntents API (form-encoded, amounts in minor units) and
//! verifies webhooks with the `stripe-signature` scheme: HMAC-SHA256 over
//! `"{timestamp}.{raw_body}"` keyed by the endpoint's webhook secret.

use async_trait::async_trait;
use axum::http::HeaderMap;
use bigdecimal::{BigDecimal, ToPrimitive};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

use crate::config::StripeConfig;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::http::{hmac_sha256_hex, secure_eq, Auth, ProviderHttpClient};
use crate::providers::provider::PaymentProvider;
use crate::providers::types::{
    CallbackEvent, CallbackKind, Channel, CreatePaymentRequest, CreatePaymentResponse,
    ProviderPaymentStatus, ProviderRefundResponse, ProviderStatusResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct StripeProvider {
    config: StripeConfig,
    http: ProviderHttpClient,
}

impl StripeProvider {
    pub fn new(config: StripeConfig) -> ProviderResult<Self> {
        let http = ProviderHttpClient::new("stripe", REQUEST_TIMEOUT)?;
        Ok(Self { config, http })
    }

    fn secret_key(&self) -> ProviderResult<&str> {
        self.config
            .secret_key
            .as_deref()
            .ok_or_else(|| ProviderError::missing_credentials("stripe"))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Convert a decimal amount to the currency's smallest unit.
    pub fn to_minor_units(amount: &BigDecimal) -> i64 {
        (amount * BigDecimal::from(100))
            .with_scale_round(0, bigdecimal::RoundingMode::HalfUp)
            .to_i64()
            .unwrap_or_default()
    }

    /// Parse `t=<ts>,v1=<hex>` out of a `stripe-signature` header value.
    pub fn parse_signature_header(header: &str) -> Option<(String, String)> {
        let mut timestamp = None;
        let mut signature = None;
        for part in header.split(',') {
            let mut kv = part.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("t"), Some(value)) => timestamp = Some(value.to_string()),
                (Some("v1"), Some(value)) if signature.is_none() => {
                    signature = Some(value.to_string())
                }
                _ => {}
            }
        }
        match (timestamp, signature) {
            (Some(t), Some(v1)) => Some((t, v1)),
            _ => None,
        }
    }

    /// Verify the signed payload `"{timestamp}.{raw_body}"`.
    pub fn verify_signature(raw_body: &[u8], header: &str, secret: &str) -> bool {
        let Some((timestamp, signature)) = Self::parse_signature_header(header) else {
            return false;
        };

        let mut signed_payload = Vec::with_capacity(timestamp.len() + 1 + raw_body.len());
        signed_payload.extend_from_slice(timestamp.as_bytes());
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(raw_body);

        let expected = hmac_sha256_hex(&signed_payload, secret);
        secure_eq(expected.as_bytes(), signature.as_bytes())
    }

    pub fn map_intent_status(raw: &str) -> ProviderPaymentStatus {
        match raw {
            "succeeded" => ProviderPaymentStatus::Completed,
            "processing" | "requires_action" | "requires_confirmation"
            | "requires_payment_method" => ProviderPaymentStatus::Pending,
            "canceled" => ProviderPaymentStatus::Cancelled,
            _ => ProviderPaymentStatus::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    status: String,
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> ProviderResult<CreatePaymentResponse> {
        let secret = self.secret_key()?.to_string();

        let mut params: Vec<(&str, String)> = vec![
            ("amount", Self::to_minor_units(&request.amount).to_string()),
            ("currency", request.currency.to_lowercase()),
            (
                "metadata[payment_ref]",
                request.payment_reference.clone(),
            ),
        ];
        if let Some(order_id) = &request.order_id {
            params.push(("metadata[order_id]", order_id.clone()));
        }
        if let Some(email) = &request.customer_email {
            params.push(("receipt_email", email.clone()));
        }
        if let Some(description) = &request.description {
            params.push(("description", description.clone()));
        }

        let raw: StripeIntent = self
            .http
            .post_form(
                &self.endpoint("/v1/payment_intents"),
                Auth::Bearer(&secret),
                &params,
            )
            .await?;

        info!(
            payment_ref = %request.payment_reference,
            provider_transaction_id = %raw.id,
            "stripe payment intent created"
        );

        // Stripe confirms client-side; there is no hosted redirect to hand
        // back.
        Ok(CreatePaymentResponse {
            provider_transaction_id: raw.id,
            redirect_url: None,
            provider_reference: None,
        })
    }

    async fn fetch_status(
        &self,
        provider_transaction_id: &str,
    ) -> ProviderResult<ProviderStatusResponse> {
        let secret = self.secret_key()?.to_string();

        let raw: StripeIntent = self
            .http
            .get_json(
                &self.endpoint(&format!("/v1/payment_intents/{}", provider_transaction_id)),
                Auth::Bearer(&secret),
            )
            .await?;

        Ok(ProviderStatusResponse {
            status: Self::map_intent_status(&raw.status),
            payer: None,
        })
    }

    async fn refund(
        &self,
        provider_transaction_id: &str,
        amount: &BigDecimal,
    ) -> ProviderResult<ProviderRefundResponse> {
        let secret = self.secret_key()?.to_string();

        let params: Vec<(&str, String)> = vec![
            ("payment_intent", provider_transaction_id.to_string()),
            ("amount", Self::to_minor_units(amount).to_string()),
        ];

        let raw: StripeRefund = self
            .http
            .post_form(&self.endpoint("/v1/refunds"), Auth::Bearer(&secret), &params)
            .await?;

        let status = match raw.status.as_str() {
            "succeeded" => ProviderPaymentStatus::Refunded,
            "pending" => ProviderPaymentStatus::Pending,
            _ => ProviderPaymentStatus::Unknown,
        };

        Ok(ProviderRefundResponse {
            refund_id: raw.id,
            status,
        })
    }

    fn verify_callback(
        &self,
        raw_body: &[u8],
        headers: &HeaderMap,
    ) -> ProviderResult<CallbackEvent> {
        let webhook_secret = self
            .config
            .webhook_secret
            .as_deref()
            .ok_or_else(|| ProviderError::missing_credentials("stripe"))?;

        let header = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ProviderError::Verification {
                message: "missing stripe-signature header".to_string(),
            })?;

        if !Self::verify_signature(raw_body, header, webhook_secret) {
            return Err(ProviderError::Verification {
                message: "stripe signature mismatch".to_string(),
            });
        }

        let payload: JsonValue =
            serde_json::from_slice(raw_body).map_err(|e| ProviderError::Verification {
                message: format!("invalid event JSON: {}", e),
            })?;

        let event_type = payload
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Verification {
                message: "event is missing type".to_string(),
            })?
            .to_string();
        let object = payload
            .get("data")
            .and_then(|d| d.get("object"))
            .ok_or_else(|| ProviderError::Verification {
                message: "event is missing data.object".to_string(),
            })?;

        let (provider_transaction_id, kind) = match event_type.as_str() {
            "payment_intent.succeeded" => {
                let id = require_string(object, "id")?;
                (id, CallbackKind::Completed)
            }
            "payment_intent.payment_failed" => {
                let id = require_string(object, "id")?;
                let reason = object
                    .get("last_payment_error")
                    .and_then(|e| e.get("message"))
                    .and_then(|v| v.as_str())
                    .map(String::from);
                (id, CallbackKind::Failed { reason })
            }
            "payment_intent.canceled" => {
                let id = require_string(object, "id")?;
                (id, CallbackKind::Cancelled)
            }
            "charge.refunded" => {
                // The refund event's object is the charge; the intent id
                // links it back to our payment.
                let id = require_string(object, "payment_intent")?;
                let amount = object
                    .get("amount_refunded")
                    .and_then(|v| v.as_i64())
                    .map(|cents| {
                        BigDecimal::from(cents) / BigDecimal::from(100)
                    });
                (id, CallbackKind::Refunded { amount })
            }
            other => {
                return Err(ProviderError::Verification {
                    message: format!("unsupported event type: {}", other),
                })
            }
        };

        Ok(CallbackEvent {
            channel: Channel::Stripe,
            event_type,
            provider_transaction_id,
            kind,
            payload,
        })
    }

    fn name(&self) -> Channel {
        Channel::Stripe
    }
}

fn require_string(object: &JsonValue, field: &str) -> ProviderResult<String> {
    object
        .get(field)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| ProviderError::Verification {
            message: format!("event object is missing {}", field),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn provider() -> StripeProvider {
        StripeProvider::new(StripeConfig {
            secret_key: Some("sk_test_123".to_string()),
            webhook_secret: Some("whsec_test".to_string()),
            base_url: "https://api.stripe.com".to_string(),
        })
        .unwrap()
    }

    fn signed_headers(body: &[u8], secret: &str, timestamp: &str) -> HeaderMap {
        let mut signed = Vec::new();
        signed.extend_from_slice(timestamp.as_bytes());
        signed.push(b'.');
        signed.extend_from_slice(body);
        let signature = hmac_sha256_hex(&signed, secret);

        let mut headers = HeaderMap::new();
        headers.insert(
            "stripe-signature",
            format!("t={},v1={}", timestamp, signature).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn minor_unit_conversion() {
        let amount = BigDecimal::from_str("10.50").unwrap();
        assert_eq!(StripeProvider::to_minor_units(&amount), 1050);
        let amount = BigDecimal::from_str("0.99").unwrap();
        assert_eq!(StripeProvider::to_minor_units(&amount), 99);
    }

    #[test]
    fn signature_header_parsing() {
        let parsed =
            StripeProvider::parse_signature_header("t=1712000000,v1=abcdef0123").unwrap();
        assert_eq!(parsed.0, "1712000000");
        assert_eq!(parsed.1, "abcdef0123");

        assert!(StripeProvider::parse_signature_header("v1=onlysig").is_none());
        assert!(StripeProvider::parse_signature_header("garbage").is_none());
    }

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let headers = signed_headers(body, "whsec_test", "1712000000");
        let header = headers.get("stripe-signature").unwrap().to_str().unwrap();
        assert!(StripeProvider::verify_signature(body, header, "whsec_test"));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let body = br#"{"type":"payment_intent.succeeded"}"#;
        let headers = signed_headers(body, "whsec_test", "1712000000");
        let header = headers.get("stripe-signature").unwrap().to_str().unwrap();
        let tampered = br#"{"type":"payment_intent.succeeded","amount":1}"#;
        assert!(!StripeProvider::verify_signature(tampered, header, "whsec_test"));
    }

    #[test]
    fn failed_intent_event_extracts_reason() {
        let provider = provider();
        let body = serde_json::json!({
            "type": "payment_intent.payment_failed",
            "data": {"object": {
                "id": "pi_X",
                "last_payment_error": {"message": "card_declined"}
            }}
        })
        .to_string();
        let headers = signed_headers(body.as_bytes(), "whsec_test", "1712000000");

        let event = provider
            .verify_callback(body.as_bytes(), &headers)
            .unwrap();
        assert_eq!(event.provider_transaction_id, "pi_X");
        assert_eq!(
            event.kind,
            CallbackKind::Failed {
                reason: Some("card_declined".to_string())
            }
        );
    }

    #[test]
    fn refund_event_converts_cents() {
        let provider = provider();
        let body = serde_json::json!({
            "type": "charge.refunded",
            "data": {"object": {
                "id": "ch_1",
                "payment_intent": "pi_X",
                "amount_refunded": 4000
            }}
        })
        .to_string();
        let headers = signed_headers(body.as_bytes(), "whsec_test", "1712000000");

        let event = provider
            .verify_callback(body.as_bytes(), &headers)
            .unwrap();
        assert_eq!(event.provider_transaction_id, "pi_X");
        match event.kind {
            CallbackKind::Refunded { amount } => {
                assert_eq!(amount.unwrap(), BigDecimal::from_str("40").unwrap());
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn bad_signature_is_rejected() {
        let provider = provider();
        let body = br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_X"}}}"#;
        let mut headers = HeaderMap::new();
        headers.insert(
            "stripe-signature",
            "t=1712000000,v1=deadbeef".parse().unwrap(),
        );
        let err = provider.verify_callback(body, &headers).unwrap_err();
        assert!(matches!(err, ProviderError::Verification { .. }));
    }
}
