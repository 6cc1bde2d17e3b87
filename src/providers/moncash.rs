//! MonCash (Digicel Haiti) adapter.
//!
//! MonCash speaks OAuth2 client-credentials over HTTP Basic, accepts amounts
//! only in HTG, and returns a JWT "payment token" whose payload segment
//! carries the provider transaction id. Callbacks carry no signature; they
//! are verified structurally.

use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::{engine::general_purpose, Engine as _};
use bigdecimal::{BigDecimal, ToPrimitive};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

use crate::config::MoncashConfig;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::http::{Auth, ProviderHttpClient};
use crate::providers::provider::PaymentProvider;
use crate::providers::token_cache::{OauthClient, TokenCache};
use crate::providers::types::{
    CallbackEvent, CallbackKind, Channel, CreatePaymentRequest, CreatePaymentResponse,
    ProviderPaymentStatus, ProviderRefundResponse, ProviderStatusResponse,
};

/// Fixed USD→HTG estimation rate.
pub const USD_TO_HTG_RATE: u32 = 140;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct MoncashProvider {
    config: MoncashConfig,
    http: ProviderHttpClient,
    tokens: TokenCache,
}

impl MoncashProvider {
    pub fn new(config: MoncashConfig, tokens: TokenCache) -> ProviderResult<Self> {
        let http = ProviderHttpClient::new("moncash", REQUEST_TIMEOUT)?;
        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    fn oauth(&self) -> ProviderResult<OauthClient> {
        let (client_id, client_secret) = match (&self.config.client_id, &self.config.client_secret)
        {
            (Some(id), Some(secret)) => (id.clone(), secret.clone()),
            _ => return Err(ProviderError::missing_credentials("moncash")),
        };

        Ok(OauthClient {
            provider: "moncash",
            token_url: format!("{}/Api/oauth/token", self.config.api_base_url),
            client_id,
            client_secret,
            scope: Some("read,write".to_string()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// MonCash only accepts gourdes; USD amounts are estimated at the fixed
    /// rate. The persisted payment keeps its original currency.
    pub fn amount_in_htg(amount: &BigDecimal, currency: &str) -> BigDecimal {
        if currency.eq_ignore_ascii_case("USD") {
            (amount * BigDecimal::from(USD_TO_HTG_RATE))
                .with_scale_round(2, bigdecimal::RoundingMode::HalfUp)
        } else {
            amount.clone()
        }
    }

    /// Decode the payload segment of the payment-token JWT without verifying
    /// it; MonCash signs it with its own key and we only need `id` and `ref`.
    pub fn decode_payment_token(token: &str) -> ProviderResult<MoncashTokenClaims> {
        let segment = token.split('.').nth(1).ok_or_else(|| ProviderError::Remote {
            provider: "moncash".to_string(),
            message: "payment token is not a JWT".to_string(),
            provider_code: None,
        })?;

        let decoded = general_purpose::URL_SAFE_NO_PAD
            .decode(segment.trim_end_matches('='))
            .map_err(|e| ProviderError::Remote {
                provider: "moncash".to_string(),
                message: format!("payment token payload is not base64: {}", e),
                provider_code: None,
            })?;

        let claims: JsonValue =
            serde_json::from_slice(&decoded).map_err(|e| ProviderError::Remote {
                provider: "moncash".to_string(),
                message: format!("payment token payload is not JSON: {}", e),
                provider_code: None,
            })?;

        let id = claims
            .get("id")
            .map(json_value_to_string)
            .ok_or_else(|| ProviderError::Remote {
                provider: "moncash".to_string(),
                message: "payment token payload is missing 'id'".to_string(),
                provider_code: None,
            })?;
        let reference = claims.get("ref").map(json_value_to_string);

        Ok(MoncashTokenClaims { id, reference })
    }
}

fn json_value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct MoncashTokenClaims {
    pub id: String,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MoncashCreateResponse {
    payment_token: MoncashPaymentToken,
}

#[derive(Debug, Deserialize)]
struct MoncashPaymentToken {
    token: String,
}

#[derive(Debug, Deserialize)]
struct MoncashRetrieveResponse {
    payment: Option<MoncashPaymentDetails>,
}

#[derive(Debug, Deserialize)]
struct MoncashPaymentDetails {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    payer: Option<String>,
}

#[async_trait]
impl PaymentProvider for MoncashProvider {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> ProviderResult<CreatePaymentResponse> {
        let oauth = self.oauth()?;
        let token = self.tokens.access_token(&oauth).await?;

        let amount_htg = Self::amount_in_htg(&request.amount, &request.currency);
        let order_id = request
            .order_id
            .clone()
            .unwrap_or_else(|| request.payment_reference.clone());

        let payload = serde_json::json!({
            "amount": amount_htg.to_f64().unwrap_or_default(),
            "orderId": order_id,
        });

        let raw: MoncashCreateResponse = self
            .http
            .post_json(
                &self.endpoint("/Api/v1/CreatePayment"),
                Auth::Bearer(&token),
                &payload,
            )
            .await?;

        let claims = Self::decode_payment_token(&raw.payment_token.token)?;
        let redirect_url = format!(
            "{}/Moncash-middleware/Checkout/Payment/Redirect?token={}",
            self.config.gateway_base_url, raw.payment_token.token
        );

        info!(
            order_id = %order_id,
            provider_transaction_id = %claims.id,
            "moncash payment created"
        );

        Ok(CreatePaymentResponse {
            provider_transaction_id: claims.id,
            redirect_url: Some(redirect_url),
            provider_reference: claims.reference,
        })
    }

    async fn fetch_status(
        &self,
        provider_transaction_id: &str,
    ) -> ProviderResult<ProviderStatusResponse> {
        let oauth = self.oauth()?;
        let token = self.tokens.access_token(&oauth).await?;

        let payload = serde_json::json!({ "transactionId": provider_transaction_id });
        let raw: MoncashRetrieveResponse = self
            .http
            .post_json(
                &self.endpoint("/Api/v1/RetrieveTransactionPayment"),
                Auth::Bearer(&token),
                &payload,
            )
            .await?;

        let details = raw.payment.ok_or_else(|| ProviderError::Remote {
            provider: "moncash".to_string(),
            message: "transaction not found".to_string(),
            provider_code: None,
        })?;

        let status = match details.message.as_deref() {
            Some("successful") | Some("completed") => ProviderPaymentStatus::Completed,
            Some("failed") => ProviderPaymentStatus::Failed,
            Some("pending") | None => ProviderPaymentStatus::Pending,
            Some(_) => ProviderPaymentStatus::Unknown,
        };

        Ok(ProviderStatusResponse {
            status,
            payer: details.payer,
        })
    }

    async fn refund(
        &self,
        provider_transaction_id: &str,
        amount: &BigDecimal,
    ) -> ProviderResult<ProviderRefundResponse> {
        // MonCash exposes no refund API; reversals settle out of band through
        // the merchant portal. The gateway books the refund and reports it as
        // accepted.
        info!(
            provider_transaction_id = %provider_transaction_id,
            amount = %amount,
            "moncash refund recorded for out-of-band settlement"
        );
        Ok(ProviderRefundResponse {
            refund_id: format!("mc_refund_{}", provider_transaction_id),
            status: ProviderPaymentStatus::Refunded,
        })
    }

    fn verify_callback(
        &self,
        raw_body: &[u8],
        _headers: &HeaderMap,
    ) -> ProviderResult<CallbackEvent> {
        let payload: JsonValue =
            serde_json::from_slice(raw_body).map_err(|e| ProviderError::Verification {
                message: format!("invalid callback JSON: {}", e),
            })?;

        // No signature on MonCash callbacks; authenticity is judged by shape.
        let transaction_id = payload
            .get("transactionId")
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::Verification {
                message: "callback is missing transactionId".to_string(),
            })?
            .to_string();

        if payload.get("orderId").and_then(|v| v.as_str()).is_none() {
            return Err(ProviderError::Verification {
                message: "callback is missing orderId".to_string(),
            });
        }
        if !payload.get("amount").map(|v| v.is_number()).unwrap_or(false) {
            return Err(ProviderError::Verification {
                message: "callback amount is missing or not numeric".to_string(),
            });
        }

        let kind = match payload.get("message").and_then(|v| v.as_str()) {
            Some("failed") => CallbackKind::Failed { reason: None },
            Some("cancelled") => CallbackKind::Cancelled,
            _ => CallbackKind::Completed,
        };
        let event_type = match &kind {
            CallbackKind::Completed => "payment.completed",
            CallbackKind::Failed { .. } => "payment.failed",
            CallbackKind::Cancelled => "payment.cancelled",
            CallbackKind::Refunded { .. } => "payment.refunded",
        };

        Ok(CallbackEvent {
            channel: Channel::Moncash,
            event_type: event_type.to_string(),
            provider_transaction_id: transaction_id,
            kind,
            payload,
        })
    }

    fn name(&self) -> Channel {
        Channel::Moncash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn provider() -> MoncashProvider {
        let config = MoncashConfig {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            api_base_url: "https://sandbox.moncashbutton.digicelgroup.com".to_string(),
            gateway_base_url: "https://sandbox.moncashbutton.digicelgroup.com".to_string(),
        };
        let pool_config = crate::cache::CachePoolConfig::default();
        // The token cache is only touched on live calls; tests here exercise
        // pure logic, so a store backed by an unconnected pool is fine.
        let store = detached_store(pool_config);
        MoncashProvider::new(config, TokenCache::new(store)).unwrap()
    }

    fn detached_store(config: crate::cache::CachePoolConfig) -> crate::cache::RedisStore {
        let manager =
            bb8_redis::RedisConnectionManager::new(config.redis_url.clone()).expect("valid url");
        let pool = bb8::Pool::builder()
            .max_size(1)
            .connection_timeout(std::time::Duration::from_millis(10))
            .build_unchecked(manager);
        crate::cache::RedisStore::new(pool)
    }

    fn fake_payment_token(claims: serde_json::Value) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn usd_amounts_convert_at_fixed_rate() {
        let usd = BigDecimal::from_str("100.00").unwrap();
        let htg = MoncashProvider::amount_in_htg(&usd, "USD");
        assert_eq!(htg, BigDecimal::from_str("14000.00").unwrap());
    }

    #[test]
    fn htg_amounts_pass_through() {
        let htg = BigDecimal::from_str("250.50").unwrap();
        assert_eq!(MoncashProvider::amount_in_htg(&htg, "HTG"), htg);
    }

    #[test]
    fn payment_token_payload_is_decoded() {
        let token = fake_payment_token(serde_json::json!({"id": "ABC", "ref": "REF1"}));
        let claims = MoncashProvider::decode_payment_token(&token).unwrap();
        assert_eq!(claims.id, "ABC");
        assert_eq!(claims.reference.as_deref(), Some("REF1"));
    }

    #[test]
    fn numeric_token_id_is_stringified() {
        let token = fake_payment_token(serde_json::json!({"id": 12345}));
        let claims = MoncashProvider::decode_payment_token(&token).unwrap();
        assert_eq!(claims.id, "12345");
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(MoncashProvider::decode_payment_token("not-a-jwt").is_err());
    }

    #[tokio::test]
    async fn callback_without_transaction_id_is_rejected() {
        let provider = provider();
        let body = br#"{"orderId": "O1", "amount": 100}"#;
        let err = provider
            .verify_callback(body, &HeaderMap::new())
            .unwrap_err();
        assert!(matches!(err, ProviderError::Verification { .. }));
    }

    #[tokio::test]
    async fn callback_with_non_numeric_amount_is_rejected() {
        let provider = provider();
        let body = br#"{"transactionId": "ABC", "orderId": "O1", "amount": "100"}"#;
        assert!(provider.verify_callback(body, &HeaderMap::new()).is_err());
    }

    #[tokio::test]
    async fn well_formed_callback_is_accepted() {
        let provider = provider();
        let body = br#"{"transactionId": "ABC", "orderId": "O1", "amount": 100}"#;
        let event = provider.verify_callback(body, &HeaderMap::new()).unwrap();
        assert_eq!(event.provider_transaction_id, "ABC");
        assert_eq!(event.kind, CallbackKind::Completed);
    }
}
