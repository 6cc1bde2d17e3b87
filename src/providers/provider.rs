use crate::providers::error::ProviderResult;
use crate::providers::types::{
    CallbackEvent, Channel, CreatePaymentRequest, CreatePaymentResponse, ProviderRefundResponse,
    ProviderStatusResponse,
};
use async_trait::async_trait;
use axum::http::HeaderMap;
use bigdecimal::BigDecimal;

/// The capability set every payment processor adapter implements.
///
/// Adapters translate the gateway's internal operations into each external
/// protocol and verify the authenticity of inbound callbacks. They are
/// stateless beyond configuration and safe to rebuild per call.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> ProviderResult<CreatePaymentResponse>;

    async fn fetch_status(
        &self,
        provider_transaction_id: &str,
    ) -> ProviderResult<ProviderStatusResponse>;

    async fn refund(
        &self,
        provider_transaction_id: &str,
        amount: &BigDecimal,
    ) -> ProviderResult<ProviderRefundResponse>;

    /// Authenticate an inbound callback and normalize it. `raw_body` must be
    /// the byte-exact request body as received on the wire.
    fn verify_callback(&self, raw_body: &[u8], headers: &HeaderMap) -> ProviderResult<CallbackEvent>;

    fn name(&self) -> Channel;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::types::{CallbackKind, ProviderPaymentStatus};
    use std::str::FromStr;

    struct MockProvider;

    #[async_trait]
    impl PaymentProvider for MockProvider {
        async fn create_payment(
            &self,
            request: CreatePaymentRequest,
        ) -> ProviderResult<CreatePaymentResponse> {
            Ok(CreatePaymentResponse {
                provider_transaction_id: "mock_tx".to_string(),
                redirect_url: Some("https://example.com/pay".to_string()),
                provider_reference: Some(request.payment_reference),
            })
        }

        async fn fetch_status(
            &self,
            _provider_transaction_id: &str,
        ) -> ProviderResult<ProviderStatusResponse> {
            Ok(ProviderStatusResponse {
                status: ProviderPaymentStatus::Completed,
                payer: None,
            })
        }

        async fn refund(
            &self,
            provider_transaction_id: &str,
            _amount: &BigDecimal,
        ) -> ProviderResult<ProviderRefundResponse> {
            Ok(ProviderRefundResponse {
                refund_id: format!("re_{}", provider_transaction_id),
                status: ProviderPaymentStatus::Refunded,
            })
        }

        fn verify_callback(
            &self,
            raw_body: &[u8],
            _headers: &HeaderMap,
        ) -> ProviderResult<CallbackEvent> {
            Ok(CallbackEvent {
                channel: Channel::Moncash,
                event_type: "mock".to_string(),
                provider_transaction_id: "mock_tx".to_string(),
                kind: CallbackKind::Completed,
                payload: serde_json::from_slice(raw_body).unwrap_or_default(),
            })
        }

        fn name(&self) -> Channel {
            Channel::Moncash
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_provider() {
        let provider: Box<dyn PaymentProvider> = Box::new(MockProvider);
        let response = provider
            .create_payment(CreatePaymentRequest {
                amount: BigDecimal::from_str("100.00").unwrap(),
                currency: "HTG".to_string(),
                order_id: Some("O1".to_string()),
                payment_reference: "pay_mock".to_string(),
                customer_phone: None,
                customer_email: None,
                description: None,
            })
            .await
            .expect("create should succeed");
        assert_eq!(response.provider_transaction_id, "mock_tx");

        let status = provider
            .fetch_status("mock_tx")
            .await
            .expect("status should succeed");
        assert_eq!(status.status, ProviderPaymentStatus::Completed);
    }
}
