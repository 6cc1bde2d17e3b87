//! Merchant-initiated refunds.
//!
//! Preconditions are checked against the observed row, the provider is asked
//! to move the money, and the accounting (ledger row, refunded_amount,
//! status flip) lands in one database transaction. The outbound
//! `payment.refunded` notification goes out only after commit.

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::payment_repository::{
    Payment, PaymentRepository, RefundWriteOutcome,
};
use crate::error::{AppError, AppErrorKind, AppResult, PaymentDomainError};
use crate::providers::factory::ProviderFactory;
use crate::providers::types::Channel;
use crate::services::webhook_dispatcher::{events, WebhookDispatcher};

#[derive(Debug, Clone)]
pub struct RefundInput {
    pub amount: BigDecimal,
    pub reason: Option<String>,
}

pub struct RefundService {
    pool: PgPool,
    factory: Arc<ProviderFactory>,
    dispatcher: Arc<WebhookDispatcher>,
}

impl RefundService {
    pub fn new(
        pool: PgPool,
        factory: Arc<ProviderFactory>,
        dispatcher: Arc<WebhookDispatcher>,
    ) -> Self {
        Self {
            pool,
            factory,
            dispatcher,
        }
    }

    pub async fn refund(
        &self,
        merchant_id: Uuid,
        reference: &str,
        input: RefundInput,
    ) -> AppResult<Payment> {
        if input.amount <= BigDecimal::from(0) {
            return Err(AppError::validation(
                "refund amount must be greater than zero",
                Some("amount"),
            ));
        }
        let amount = input
            .amount
            .with_scale_round(2, bigdecimal::RoundingMode::HalfUp);

        let repo = PaymentRepository::new(self.pool.clone());
        let payment = repo
            .find_by_reference(merchant_id, reference)
            .await?
            .ok_or_else(|| {
                AppError::new(AppErrorKind::Payment(PaymentDomainError::NotFound {
                    reference: reference.to_string(),
                }))
            })?;

        if !payment.status().is_refundable() {
            return Err(AppError::new(AppErrorKind::Payment(
                PaymentDomainError::RefundNotAllowed {
                    reference: payment.reference.clone(),
                    status: payment.status.clone(),
                },
            )));
        }
        let outstanding = &payment.amount - &payment.refunded_amount;
        if amount > outstanding {
            return Err(AppError::new(AppErrorKind::Payment(
                PaymentDomainError::RefundExceedsAmount {
                    reference: payment.reference.clone(),
                },
            )));
        }

        // Ask the processor to move the money before booking anything.
        if let Some(provider_tx_id) = &payment.provider_transaction_id {
            let channel = Channel::from_str(&payment.channel)?;
            let adapter = self.factory.get_provider(channel)?;
            let refund = adapter.refund(provider_tx_id, &amount).await?;
            info!(
                payment = %payment.reference,
                refund_id = %refund.refund_id,
                "provider accepted refund"
            );
        }

        let updated = match repo.apply_refund(payment.id, &amount).await? {
            RefundWriteOutcome::Applied {
                payment: updated,
                transaction_reference,
            } => {
                info!(
                    payment = %updated.reference,
                    amount = %amount,
                    transaction = %transaction_reference,
                    reason = input.reason.as_deref().unwrap_or(""),
                    new_status = %updated.status,
                    "refund booked"
                );
                updated
            }
            RefundWriteOutcome::NotAllowed { status } => {
                return Err(AppError::new(AppErrorKind::Payment(
                    PaymentDomainError::RefundNotAllowed {
                        reference: payment.reference.clone(),
                        status,
                    },
                )))
            }
            RefundWriteOutcome::ExceedsBalance => {
                return Err(AppError::new(AppErrorKind::Payment(
                    PaymentDomainError::RefundExceedsAmount {
                        reference: payment.reference.clone(),
                    },
                )))
            }
        };

        self.dispatcher
            .dispatch(&updated, events::PAYMENT_REFUNDED)
            .await?;

        Ok(updated)
    }
}
