use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::transaction_repository::{self, LedgerEntryType, NewLedgerEntry};

/// Payment lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Expired,
    PartiallyRefunded,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Expired => "expired",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "cancelled" => Some(PaymentStatus::Cancelled),
            "expired" => Some(PaymentStatus::Expired),
            "partially_refunded" => Some(PaymentStatus::PartiallyRefunded),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// Validates if a state transition is allowed
    pub fn can_transition_to(&self, next: &PaymentStatus) -> bool {
        match (self, next) {
            // Normal flow
            (PaymentStatus::Pending, PaymentStatus::Processing) => true,
            (PaymentStatus::Processing, PaymentStatus::Completed) => true,
            (PaymentStatus::Processing, PaymentStatus::Failed) => true,
            (PaymentStatus::Processing, PaymentStatus::Cancelled) => true,

            // Dispatch can fail terminally before the provider ever accepted
            (PaymentStatus::Pending, PaymentStatus::Failed) => true,

            // Refund flow
            (PaymentStatus::Completed, PaymentStatus::PartiallyRefunded) => true,
            (PaymentStatus::Completed, PaymentStatus::Refunded) => true,
            (PaymentStatus::PartiallyRefunded, PaymentStatus::Refunded) => true,

            // Expiration
            (PaymentStatus::Pending, PaymentStatus::Expired) => true,

            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed
                | PaymentStatus::Cancelled
                | PaymentStatus::Expired
                | PaymentStatus::Refunded
        )
    }

    pub fn is_refundable(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded
        )
    }

    /// States in which a credit has been booked.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded | PaymentStatus::Refunded
        )
    }
}

/// Payment entity
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: i64,
    pub reference: String,
    pub merchant_id: Uuid,
    pub channel: String,
    pub status: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub fee_rate: BigDecimal,
    pub fee_amount: BigDecimal,
    pub net_amount: BigDecimal,
    pub refunded_amount: BigDecimal,
    pub provider_transaction_id: Option<String>,
    pub redirect_url: Option<String>,
    pub idempotency_key: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub customer_id: Option<i64>,
    pub order_id: Option<String>,
    pub metadata: Option<JsonValue>,
    pub failure_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_str(&self.status).unwrap_or(PaymentStatus::Pending)
    }
}

/// Customer entity, upserted when a payment completes.
#[derive(Debug, Clone, FromRow)]
pub struct Customer {
    pub id: i64,
    pub merchant_id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub total_spent: BigDecimal,
    pub payment_count: i32,
    pub first_payment_at: DateTime<Utc>,
    pub last_payment_at: DateTime<Utc>,
}

/// Fields required to insert a new payment row.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reference: String,
    pub merchant_id: Uuid,
    pub channel: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub fee_rate: BigDecimal,
    pub fee_amount: BigDecimal,
    pub net_amount: BigDecimal,
    pub idempotency_key: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub order_id: Option<String>,
    pub metadata: Option<JsonValue>,
    pub expires_at: DateTime<Utc>,
}

/// Filters for the merchant-scoped payment listing.
#[derive(Debug, Clone, Default)]
pub struct PaymentListFilter {
    pub status: Option<String>,
    pub channel: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the primary id (decoded pagination cursor).
    pub before_id: Option<i64>,
    pub limit: i64,
}

/// Result of applying a lifecycle transition.
#[derive(Debug)]
pub enum TransitionOutcome {
    /// The transition was applied and committed.
    Applied(Payment),
    /// The row already carried the target status; nothing was written.
    AlreadyAtTarget(Payment),
    /// The target is not reachable from the observed status.
    Invalid { current: String },
}

/// Result of the atomic refund write.
#[derive(Debug)]
pub enum RefundWriteOutcome {
    Applied {
        payment: Payment,
        transaction_reference: String,
    },
    NotAllowed {
        status: String,
    },
    ExceedsBalance,
}

const PAYMENT_COLUMNS: &str = "id, reference, merchant_id, channel, status, amount, currency, \
     fee_rate, fee_amount, net_amount, refunded_amount, provider_transaction_id, redirect_url, \
     idempotency_key, customer_email, customer_phone, customer_name, customer_id, order_id, \
     metadata, failure_reason, expires_at, created_at, updated_at, completed_at, failed_at";

/// Repository for payment rows and their atomic lifecycle writes.
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, new: NewPayment) -> Result<Payment, DatabaseError> {
        let sql = format!(
            "INSERT INTO payments (reference, merchant_id, channel, status, amount, currency, \
             fee_rate, fee_amount, net_amount, refunded_amount, idempotency_key, customer_email, \
             customer_phone, customer_name, order_id, metadata, expires_at) \
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, 0, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {PAYMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(&new.reference)
            .bind(new.merchant_id)
            .bind(&new.channel)
            .bind(&new.amount)
            .bind(&new.currency)
            .bind(&new.fee_rate)
            .bind(&new.fee_amount)
            .bind(&new.net_amount)
            .bind(&new.idempotency_key)
            .bind(&new.customer_email)
            .bind(&new.customer_phone)
            .bind(&new.customer_name)
            .bind(&new.order_id)
            .bind(&new.metadata)
            .bind(new.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Payment>, DatabaseError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Merchant-scoped lookup by client-facing reference.
    pub async fn find_by_reference(
        &self,
        merchant_id: Uuid,
        reference: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE merchant_id = $1 AND reference = $2"
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(merchant_id)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Unscoped lookup used by the public checkout page.
    pub async fn find_by_reference_any(
        &self,
        reference: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1");
        sqlx::query_as::<_, Payment>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Correlates an inbound provider callback to its payment.
    pub async fn find_by_provider_transaction(
        &self,
        channel: &str,
        provider_transaction_id: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE channel = $1 AND provider_transaction_id = $2"
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(channel)
            .bind(provider_transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list(
        &self,
        merchant_id: Uuid,
        filter: &PaymentListFilter,
    ) -> Result<Vec<Payment>, DatabaseError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE merchant_id = "
        ));
        builder.push_bind(merchant_id);

        if let Some(status) = &filter.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(channel) = &filter.channel {
            builder.push(" AND channel = ").push_bind(channel);
        }
        if let Some(from) = filter.from {
            builder.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            builder.push(" AND created_at <= ").push_bind(to);
        }
        if let Some(before_id) = filter.before_id {
            builder.push(" AND id < ").push_bind(before_id);
        }

        builder.push(" ORDER BY id DESC LIMIT ").push_bind(filter.limit);

        builder
            .build_query_as::<Payment>()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// pending → processing, recording the provider handle and redirect URL.
    ///
    /// The status guard keeps the transition monotonic under job redelivery.
    pub async fn mark_processing(
        &self,
        id: i64,
        provider_transaction_id: &str,
        redirect_url: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payments \
             SET status = 'processing', provider_transaction_id = $2, redirect_url = $3, \
                 updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .bind(provider_transaction_id)
        .bind(redirect_url)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// processing → completed.
    ///
    /// One transaction covers the status flip, the `credit` ledger row, and
    /// the customer upsert, so a crash can never leave a completed payment
    /// without its ledger entry.
    pub async fn complete(&self, id: i64) -> Result<TransitionOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .ok_or_else(|| DatabaseError::not_found("Payment", id.to_string()))?;

        let current = payment.status();
        if current.is_settled() {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(TransitionOutcome::AlreadyAtTarget(payment));
        }
        if !current.can_transition_to(&PaymentStatus::Completed) {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(TransitionOutcome::Invalid {
                current: payment.status.clone(),
            });
        }

        transaction_repository::insert_entry(
            &mut tx,
            NewLedgerEntry {
                reference: crate::refs::transaction_ref(),
                payment_id: payment.id,
                merchant_id: payment.merchant_id,
                entry_type: LedgerEntryType::Credit,
                amount: payment.amount.clone(),
                currency: payment.currency.clone(),
            },
        )
        .await?;

        let customer_id = self.upsert_customer(&mut tx, &payment).await?;

        let net_amount = &payment.amount - &payment.fee_amount;
        let sql = format!(
            "UPDATE payments \
             SET status = 'completed', net_amount = $2, customer_id = $3, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.id)
            .bind(&net_amount)
            .bind(customer_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(TransitionOutcome::Applied(updated))
    }

    /// Match an existing customer by email or phone within the merchant,
    /// update their aggregates, or insert a fresh row.
    async fn upsert_customer(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        payment: &Payment,
    ) -> Result<Option<i64>, DatabaseError> {
        if payment.customer_email.is_none() && payment.customer_phone.is_none() {
            return Ok(None);
        }

        let existing = sqlx::query_as::<_, Customer>(
            "SELECT id, merchant_id, email, phone, name, total_spent, payment_count, \
                    first_payment_at, last_payment_at \
             FROM customers \
             WHERE merchant_id = $1 \
               AND ((email IS NOT NULL AND email = $2) OR (phone IS NOT NULL AND phone = $3)) \
             LIMIT 1 \
             FOR UPDATE",
        )
        .bind(payment.merchant_id)
        .bind(&payment.customer_email)
        .bind(&payment.customer_phone)
        .fetch_optional(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let customer_id = match existing {
            Some(customer) => {
                sqlx::query(
                    "UPDATE customers \
                     SET total_spent = total_spent + $2, payment_count = payment_count + 1, \
                         last_payment_at = NOW(), name = COALESCE(name, $3) \
                     WHERE id = $1",
                )
                .bind(customer.id)
                .bind(&payment.amount)
                .bind(&payment.customer_name)
                .execute(&mut **tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
                customer.id
            }
            None => {
                let row: (i64,) = sqlx::query_as(
                    "INSERT INTO customers \
                         (merchant_id, email, phone, name, total_spent, payment_count, \
                          first_payment_at, last_payment_at) \
                     VALUES ($1, $2, $3, $4, $5, 1, NOW(), NOW()) \
                     RETURNING id",
                )
                .bind(payment.merchant_id)
                .bind(&payment.customer_email)
                .bind(&payment.customer_phone)
                .bind(&payment.customer_name)
                .bind(&payment.amount)
                .fetch_one(&mut **tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
                row.0
            }
        };

        Ok(Some(customer_id))
    }

    /// pending|processing → failed.
    pub async fn mark_failed(
        &self,
        id: i64,
        reason: &str,
    ) -> Result<TransitionOutcome, DatabaseError> {
        self.apply_terminal(id, PaymentStatus::Failed, Some(reason))
            .await
    }

    /// processing → cancelled.
    pub async fn mark_cancelled(&self, id: i64) -> Result<TransitionOutcome, DatabaseError> {
        self.apply_terminal(id, PaymentStatus::Cancelled, None).await
    }

    async fn apply_terminal(
        &self,
        id: i64,
        target: PaymentStatus,
        reason: Option<&str>,
    ) -> Result<TransitionOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .ok_or_else(|| DatabaseError::not_found("Payment", id.to_string()))?;

        let current = payment.status();
        if current == target {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(TransitionOutcome::AlreadyAtTarget(payment));
        }
        if !current.can_transition_to(&target) {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(TransitionOutcome::Invalid {
                current: payment.status.clone(),
            });
        }

        let sql = format!(
            "UPDATE payments \
             SET status = $2, failure_reason = COALESCE($3, failure_reason), \
                 failed_at = CASE WHEN $2 = 'failed' THEN NOW() ELSE failed_at END, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.id)
            .bind(target.as_str())
            .bind(reason)
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(TransitionOutcome::Applied(updated))
    }

    /// Atomic refund write: `refund` ledger row, refunded_amount bump, and
    /// status flip in one transaction. The `refunded_amount = observed`
    /// guard rejects a concurrent refund that slipped between read and
    /// write.
    pub async fn apply_refund(
        &self,
        id: i64,
        amount: &BigDecimal,
    ) -> Result<RefundWriteOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE");
        let payment = sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .ok_or_else(|| DatabaseError::not_found("Payment", id.to_string()))?;

        if !payment.status().is_refundable() {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(RefundWriteOutcome::NotAllowed {
                status: payment.status.clone(),
            });
        }

        let outstanding = &payment.amount - &payment.refunded_amount;
        if amount > &outstanding {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(RefundWriteOutcome::ExceedsBalance);
        }

        let transaction_reference = crate::refs::transaction_ref();
        transaction_repository::insert_entry(
            &mut tx,
            NewLedgerEntry {
                reference: transaction_reference.clone(),
                payment_id: payment.id,
                merchant_id: payment.merchant_id,
                entry_type: LedgerEntryType::Refund,
                amount: amount.clone(),
                currency: payment.currency.clone(),
            },
        )
        .await?;

        let new_refunded = &payment.refunded_amount + amount;
        let new_status = if new_refunded == payment.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };

        let sql = format!(
            "UPDATE payments \
             SET refunded_amount = $2, status = $3, updated_at = NOW() \
             WHERE id = $1 AND refunded_amount = $4 \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.id)
            .bind(&new_refunded)
            .bind(new_status.as_str())
            .bind(&payment.refunded_amount)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let updated = match updated {
            Some(row) => row,
            None => {
                tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
                return Err(DatabaseError::new(DatabaseErrorKind::WriteConflict {
                    entity: "Payment".to_string(),
                }));
            }
        };

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(RefundWriteOutcome::Applied {
            payment: updated,
            transaction_reference,
        })
    }

    /// Background sweep: pending payments past their expiry become `expired`.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE payments \
             SET status = 'expired', updated_at = NOW() \
             WHERE status = 'pending' AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Expired,
            PaymentStatus::PartiallyRefunded,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(PaymentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::from_str("bogus"), None);
    }

    #[test]
    fn transition_graph_allows_forward_moves() {
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Processing));
        assert!(PaymentStatus::Processing.can_transition_to(&PaymentStatus::Completed));
        assert!(PaymentStatus::Processing.can_transition_to(&PaymentStatus::Failed));
        assert!(PaymentStatus::Processing.can_transition_to(&PaymentStatus::Cancelled));
        assert!(PaymentStatus::Completed.can_transition_to(&PaymentStatus::PartiallyRefunded));
        assert!(PaymentStatus::Completed.can_transition_to(&PaymentStatus::Refunded));
        assert!(PaymentStatus::PartiallyRefunded.can_transition_to(&PaymentStatus::Refunded));
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Expired));
        assert!(PaymentStatus::Pending.can_transition_to(&PaymentStatus::Failed));
    }

    #[test]
    fn transition_graph_rejects_reverse_moves() {
        assert!(!PaymentStatus::Completed.can_transition_to(&PaymentStatus::Processing));
        assert!(!PaymentStatus::Failed.can_transition_to(&PaymentStatus::Completed));
        assert!(!PaymentStatus::Refunded.can_transition_to(&PaymentStatus::Completed));
        assert!(!PaymentStatus::Expired.can_transition_to(&PaymentStatus::Processing));
        assert!(!PaymentStatus::Cancelled.can_transition_to(&PaymentStatus::Refunded));
    }

    #[test]
    fn refundable_states() {
        assert!(PaymentStatus::Completed.is_refundable());
        assert!(PaymentStatus::PartiallyRefunded.is_refundable());
        assert!(!PaymentStatus::Pending.is_refundable());
        assert!(!PaymentStatus::Refunded.is_refundable());
    }
}
