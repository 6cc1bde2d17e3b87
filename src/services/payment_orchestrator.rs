//! Applies lifecycle transitions triggered by provider callbacks and queue
//! workers, and fans the resulting events out to merchant webhooks.
//!
//! Transitions are idempotent: a replayed callback that finds the payment
//! already at the target status is a no-op success, and a transition that is
//! not legal from the observed status is logged and swallowed so providers
//! are never retried into a dead end.

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::payment_repository::{Payment, PaymentRepository, RefundWriteOutcome, TransitionOutcome};
use crate::error::AppResult;
use crate::providers::types::CallbackKind;
use crate::services::webhook_dispatcher::{events, WebhookDispatcher};

pub struct PaymentOrchestrator {
    pool: PgPool,
    dispatcher: Arc<WebhookDispatcher>,
}

impl PaymentOrchestrator {
    pub fn new(pool: PgPool, dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self { pool, dispatcher }
    }

    /// Apply an authenticated provider callback to its payment.
    pub async fn apply_callback(&self, payment: &Payment, kind: CallbackKind) -> AppResult<()> {
        match kind {
            CallbackKind::Completed => self.complete(payment).await,
            CallbackKind::Failed { reason } => {
                self.fail(
                    payment,
                    reason.as_deref().unwrap_or("provider reported failure"),
                )
                .await
            }
            CallbackKind::Cancelled => self.cancel(payment).await,
            CallbackKind::Refunded { amount } => self.refund_from_provider(payment, amount).await,
        }
    }

    async fn complete(&self, payment: &Payment) -> AppResult<()> {
        let repo = PaymentRepository::new(self.pool.clone());
        match repo.complete(payment.id).await? {
            TransitionOutcome::Applied(updated) => {
                info!(payment = %updated.reference, "payment completed");
                self.dispatcher
                    .dispatch(&updated, events::PAYMENT_SUCCEEDED)
                    .await?;
            }
            TransitionOutcome::AlreadyAtTarget(_) => {
                info!(payment = %payment.reference, "completion replayed, no-op");
            }
            TransitionOutcome::Invalid { current } => {
                warn!(
                    payment = %payment.reference,
                    current = %current,
                    "completion callback ignored: not reachable from current status"
                );
            }
        }
        Ok(())
    }

    async fn fail(&self, payment: &Payment, reason: &str) -> AppResult<()> {
        let repo = PaymentRepository::new(self.pool.clone());
        match repo.mark_failed(payment.id, reason).await? {
            TransitionOutcome::Applied(updated) => {
                info!(payment = %updated.reference, reason = reason, "payment failed");
                self.dispatcher
                    .dispatch(&updated, events::PAYMENT_FAILED)
                    .await?;
            }
            TransitionOutcome::AlreadyAtTarget(_) => {
                info!(payment = %payment.reference, "failure replayed, no-op");
            }
            TransitionOutcome::Invalid { current } => {
                warn!(
                    payment = %payment.reference,
                    current = %current,
                    "failure callback ignored: not reachable from current status"
                );
            }
        }
        Ok(())
    }

    async fn cancel(&self, payment: &Payment) -> AppResult<()> {
        let repo = PaymentRepository::new(self.pool.clone());
        match repo.mark_cancelled(payment.id).await? {
            TransitionOutcome::Applied(updated) => {
                info!(payment = %updated.reference, "payment cancelled");
                self.dispatcher
                    .dispatch(&updated, events::PAYMENT_CANCELLED)
                    .await?;
            }
            TransitionOutcome::AlreadyAtTarget(_) => {
                info!(payment = %payment.reference, "cancellation replayed, no-op");
            }
            TransitionOutcome::Invalid { current } => {
                warn!(
                    payment = %payment.reference,
                    current = %current,
                    "cancellation callback ignored: not reachable from current status"
                );
            }
        }
        Ok(())
    }

    /// A refund initiated on the provider's side (e.g. from the Stripe
    /// dashboard). Books the refund locally; with no amount given the full
    /// outstanding balance is assumed.
    async fn refund_from_provider(
        &self,
        payment: &Payment,
        amount: Option<BigDecimal>,
    ) -> AppResult<()> {
        let repo = PaymentRepository::new(self.pool.clone());

        let already_refunded = &payment.refunded_amount;
        let amount = match amount {
            // Providers report the cumulative refunded total; book the delta.
            Some(total) => &total - already_refunded,
            None => &payment.amount - already_refunded,
        };
        if amount <= BigDecimal::from(0) {
            info!(payment = %payment.reference, "provider refund already booked, no-op");
            return Ok(());
        }

        match repo.apply_refund(payment.id, &amount).await? {
            RefundWriteOutcome::Applied { payment: updated, .. } => {
                info!(
                    payment = %updated.reference,
                    amount = %amount,
                    "provider-initiated refund booked"
                );
                self.dispatcher
                    .dispatch(&updated, events::PAYMENT_REFUNDED)
                    .await?;
            }
            RefundWriteOutcome::NotAllowed { status } => {
                warn!(
                    payment = %payment.reference,
                    status = %status,
                    "provider refund ignored: payment not refundable"
                );
            }
            RefundWriteOutcome::ExceedsBalance => {
                warn!(
                    payment = %payment.reference,
                    "provider refund ignored: exceeds outstanding balance"
                );
            }
        }
        Ok(())
    }

    /// Terminal failure after the dispatch job exhausted its retries.
    pub async fn fail_after_exhaustion(&self, payment_id: i64, reason: &str) -> AppResult<()> {
        let repo = PaymentRepository::new(self.pool.clone());
        let Some(payment) = repo.find_by_id(payment_id).await? else {
            warn!(payment_id = payment_id, "exhausted job references unknown payment");
            return Ok(());
        };
        self.fail(&payment, reason).await
    }
}
