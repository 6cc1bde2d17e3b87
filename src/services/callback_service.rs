//! Provider callback reconciler.
//!
//! Authenticates inbound provider notifications, correlates them to
//! payments by the provider's transaction handle, and hands the state
//! machine the transition. Unmatched events are logged and acknowledged
//! with success so the provider does not retry indefinitely.

use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::{info, warn};

use crate::database::payment_repository::PaymentRepository;
use crate::error::AppResult;
use crate::providers::factory::ProviderFactory;
use crate::providers::types::Channel;
use crate::services::payment_orchestrator::PaymentOrchestrator;

pub struct CallbackService {
    pool: PgPool,
    factory: Arc<ProviderFactory>,
    orchestrator: Arc<PaymentOrchestrator>,
}

impl CallbackService {
    pub fn new(
        pool: PgPool,
        factory: Arc<ProviderFactory>,
        orchestrator: Arc<PaymentOrchestrator>,
    ) -> Self {
        Self {
            pool,
            factory,
            orchestrator,
        }
    }

    /// Process one raw callback. Signature and payload failures surface as
    /// errors (the HTTP layer maps them to 400 before any state change);
    /// everything else resolves to Ok so the provider sees a 200.
    pub async fn process(
        &self,
        channel: &str,
        headers: &HeaderMap,
        raw_body: &[u8],
    ) -> AppResult<()> {
        let channel = Channel::from_str(channel)?;
        let adapter = self.factory.get_provider(channel)?;

        let event = adapter.verify_callback(raw_body, headers)?;

        info!(
            channel = %channel,
            event_type = %event.event_type,
            provider_transaction_id = %event.provider_transaction_id,
            "provider callback verified"
        );

        let repo = PaymentRepository::new(self.pool.clone());
        let payment = repo
            .find_by_provider_transaction(channel.as_str(), &event.provider_transaction_id)
            .await?;

        let Some(payment) = payment else {
            // Acknowledge unmatched events; a 4xx would make the provider
            // retry a notification we can never apply.
            warn!(
                channel = %channel,
                provider_transaction_id = %event.provider_transaction_id,
                "callback does not match any payment"
            );
            return Ok(());
        };

        self.orchestrator.apply_callback(&payment, event.kind).await
    }
}
