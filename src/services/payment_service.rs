//! Create/read surface of the payment pipeline.
//!
//! Create validates, checks the idempotency cache, snapshots the fee, writes
//! the `pending` row, and enqueues the dispatch job on the channel's queue.
//! The worker takes it from there; nothing here talks to a provider.

use base64::{engine::general_purpose, Engine as _};
use bigdecimal::BigDecimal;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::database::payment_repository::{
    NewPayment, Payment, PaymentListFilter, PaymentRepository,
};
use crate::error::{AppError, AppErrorKind, AppResult, PaymentDomainError};
use crate::providers::types::Channel;
use crate::queue::{names, JobQueue, PAYMENT_JOB_OPTIONS};
use crate::services::fees;
use crate::services::idempotency::IdempotencyStore;
use crate::refs;

/// Payments not dispatched within this window expire.
pub const PAYMENT_EXPIRY_MINUTES: i64 = 30;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Payload of a dispatch job on `payments.{channel}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchPaymentJob {
    pub payment_id: i64,
    pub reference: String,
}

/// Validated create-payment input.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentInput {
    pub amount: BigDecimal,
    pub currency: String,
    pub channel: String,
    pub order_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<JsonValue>,
}

/// Listing parameters after cursor decoding.
#[derive(Debug, Clone, Default)]
pub struct ListPaymentsQuery {
    pub status: Option<String>,
    pub channel: Option<String>,
    pub from: Option<chrono::DateTime<Utc>>,
    pub to: Option<chrono::DateTime<Utc>>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

pub struct PaymentService {
    pool: PgPool,
    queue: JobQueue,
    idempotency: IdempotencyStore,
}

impl PaymentService {
    pub fn new(pool: PgPool, queue: JobQueue, idempotency: IdempotencyStore) -> Self {
        Self {
            pool,
            queue,
            idempotency,
        }
    }

    /// Create a payment. With an `Idempotency-Key`, a replayed request
    /// returns the cached response verbatim and creates nothing.
    pub async fn create(
        &self,
        merchant_id: Uuid,
        input: CreatePaymentInput,
        idempotency_key: Option<String>,
    ) -> AppResult<JsonValue> {
        if let Some(key) = &idempotency_key {
            if let Some(cached) = self.idempotency.get(merchant_id, key).await {
                info!(merchant_id = %merchant_id, "idempotent create replayed from cache");
                return Ok(cached);
            }
        }

        let channel = Channel::from_str(&input.channel)?;
        let currency = input.currency.to_uppercase();
        if currency != "HTG" && currency != "USD" {
            return Err(AppError::validation(
                "currency must be HTG or USD",
                Some("currency"),
            ));
        }
        if input.amount <= BigDecimal::from(0) {
            return Err(AppError::validation(
                "amount must be greater than zero",
                Some("amount"),
            ));
        }

        let amount = input
            .amount
            .with_scale_round(2, bigdecimal::RoundingMode::HalfUp);
        let fee_rate = fees::fee_rate(channel);
        let fee_amount = fees::fee_amount(&amount, &fee_rate);
        let net_amount = fees::net_amount(&amount, &fee_amount);

        let repo = PaymentRepository::new(self.pool.clone());
        let payment = repo
            .insert(NewPayment {
                reference: refs::payment_ref(),
                merchant_id,
                channel: channel.as_str().to_string(),
                amount,
                currency,
                fee_rate,
                fee_amount,
                net_amount,
                idempotency_key: idempotency_key.clone(),
                customer_email: input.customer_email,
                customer_phone: input.customer_phone,
                customer_name: input.customer_name,
                order_id: input.order_id,
                metadata: input.metadata,
                expires_at: Utc::now() + ChronoDuration::minutes(PAYMENT_EXPIRY_MINUTES),
            })
            .await?;

        let job = DispatchPaymentJob {
            payment_id: payment.id,
            reference: payment.reference.clone(),
        };
        self.queue
            .enqueue(
                names::payments_queue(channel),
                serde_json::to_value(&job).unwrap_or_default(),
                PAYMENT_JOB_OPTIONS,
            )
            .await
            .map_err(AppError::from)?;

        info!(
            payment = %payment.reference,
            channel = %channel,
            "payment created and dispatch enqueued"
        );

        let response = payment_view(&payment);
        if let Some(key) = &idempotency_key {
            self.idempotency.put(merchant_id, key, &response).await;
        }
        Ok(response)
    }

    pub async fn get(&self, merchant_id: Uuid, reference: &str) -> AppResult<Payment> {
        let repo = PaymentRepository::new(self.pool.clone());
        repo.find_by_reference(merchant_id, reference)
            .await?
            .ok_or_else(|| {
                AppError::new(AppErrorKind::Payment(PaymentDomainError::NotFound {
                    reference: reference.to_string(),
                }))
            })
    }

    pub async fn list(
        &self,
        merchant_id: Uuid,
        query: ListPaymentsQuery,
    ) -> AppResult<(Vec<Payment>, Option<String>)> {
        let before_id = match &query.cursor {
            Some(cursor) => Some(decode_cursor(cursor).ok_or_else(|| {
                AppError::validation("malformed pagination cursor", Some("cursor"))
            })?),
            None => None,
        };

        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let repo = PaymentRepository::new(self.pool.clone());
        let payments = repo
            .list(
                merchant_id,
                &PaymentListFilter {
                    status: query.status,
                    channel: query.channel,
                    from: query.from,
                    to: query.to,
                    before_id,
                    limit,
                },
            )
            .await?;

        let next_cursor = if payments.len() as i64 == limit {
            payments.last().map(|p| encode_cursor(p.id))
        } else {
            None
        };

        Ok((payments, next_cursor))
    }

    /// Unauthenticated read backing the hosted checkout page.
    pub async fn checkout_view(&self, reference: &str) -> AppResult<JsonValue> {
        let repo = PaymentRepository::new(self.pool.clone());
        let payment = repo.find_by_reference_any(reference).await?.ok_or_else(|| {
            AppError::new(AppErrorKind::Payment(PaymentDomainError::NotFound {
                reference: reference.to_string(),
            }))
        })?;

        Ok(json!({
            "reference": payment.reference,
            "status": payment.status,
            "channel": payment.channel,
            "amount": payment.amount.to_string(),
            "currency": payment.currency,
            "order_id": payment.order_id,
            "redirect_url": payment.redirect_url,
            "expires_at": payment.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }))
    }
}

/// Client-facing payment representation. Amounts are decimal strings.
pub fn payment_view(payment: &Payment) -> JsonValue {
    json!({
        "reference": payment.reference,
        "status": payment.status,
        "channel": payment.channel,
        "amount": payment.amount.to_string(),
        "currency": payment.currency,
        "fee_amount": payment.fee_amount.to_string(),
        "net_amount": payment.net_amount.to_string(),
        "refunded_amount": payment.refunded_amount.to_string(),
        "provider_transaction_id": payment.provider_transaction_id,
        "redirect_url": payment.redirect_url,
        "order_id": payment.order_id,
        "customer": {
            "email": payment.customer_email,
            "phone": payment.customer_phone,
            "name": payment.customer_name,
        },
        "metadata": payment.metadata,
        "failure_reason": payment.failure_reason,
        "expires_at": payment.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "created_at": payment.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "completed_at": payment.completed_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        "failed_at": payment.failed_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
    })
}

/// Opaque cursor: base64 of the last row's primary id.
pub fn encode_cursor(id: i64) -> String {
    general_purpose::STANDARD.encode(id.to_string())
}

pub fn decode_cursor(cursor: &str) -> Option<i64> {
    let bytes = general_purpose::STANDARD.decode(cursor).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let cursor = encode_cursor(42);
        assert_eq!(decode_cursor(&cursor), Some(42));
    }

    #[test]
    fn malformed_cursors_are_rejected() {
        assert_eq!(decode_cursor("!!not-base64!!"), None);
        let not_a_number = general_purpose::STANDARD.encode("pay_abc");
        assert_eq!(decode_cursor(&not_a_number), None);
    }

    #[test]
    fn dispatch_job_round_trips() {
        let job = DispatchPaymentJob {
            payment_id: 7,
            reference: "pay_x".to_string(),
        };
        let value = serde_json::to_value(&job).unwrap();
        let back: DispatchPaymentJob = serde_json::from_value(value).unwrap();
        assert_eq!(back.payment_id, 7);
        assert_eq!(back.reference, "pay_x");
    }
}
