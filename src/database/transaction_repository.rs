use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres};
use uuid::Uuid;

use crate::database::error::DatabaseError;

/// Ledger entry kinds. `credit` books the gross amount on completion,
/// `refund` books each (partial) refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntryType {
    Credit,
    Refund,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Credit => "credit",
            LedgerEntryType::Refund => "refund",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(LedgerEntryType::Credit),
            "refund" => Some(LedgerEntryType::Refund),
            _ => None,
        }
    }
}

/// Immutable ledger row recording one money event against a payment.
#[derive(Debug, Clone, FromRow)]
pub struct LedgerTransaction {
    pub id: i64,
    pub reference: String,
    pub payment_id: i64,
    pub merchant_id: Uuid,
    pub entry_type: String,
    pub status: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub reference: String,
    pub payment_id: i64,
    pub merchant_id: Uuid,
    pub entry_type: LedgerEntryType,
    pub amount: BigDecimal,
    pub currency: String,
}

const TRANSACTION_COLUMNS: &str =
    "id, reference, payment_id, merchant_id, entry_type, status, amount, currency, created_at";

/// Insert a ledger entry inside an open payment transaction so the entry
/// commits (or rolls back) together with the status change it records.
pub async fn insert_entry(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    entry: NewLedgerEntry,
) -> Result<LedgerTransaction, DatabaseError> {
    let sql = format!(
        "INSERT INTO transactions \
             (reference, payment_id, merchant_id, entry_type, status, amount, currency) \
         VALUES ($1, $2, $3, $4, 'succeeded', $5, $6) \
         RETURNING {TRANSACTION_COLUMNS}"
    );
    sqlx::query_as::<_, LedgerTransaction>(&sql)
        .bind(&entry.reference)
        .bind(entry.payment_id)
        .bind(entry.merchant_id)
        .bind(entry.entry_type.as_str())
        .bind(&entry.amount)
        .bind(&entry.currency)
        .fetch_one(&mut **tx)
        .await
        .map_err(DatabaseError::from_sqlx)
}

/// Read access to the ledger.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_payment(
        &self,
        payment_id: i64,
    ) -> Result<Vec<LedgerTransaction>, DatabaseError> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE payment_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, LedgerTransaction>(&sql)
            .bind(payment_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Sum of refund entries for a payment; backs the
    /// `refunded_amount = Σ refunds` invariant check.
    pub async fn refunded_total(&self, payment_id: i64) -> Result<BigDecimal, DatabaseError> {
        let row: (Option<BigDecimal>,) = sqlx::query_as(
            "SELECT SUM(amount) FROM transactions \
             WHERE payment_id = $1 AND entry_type = 'refund'",
        )
        .bind(payment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.0.unwrap_or_else(|| BigDecimal::from(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_round_trips() {
        assert_eq!(
            LedgerEntryType::from_str("credit"),
            Some(LedgerEntryType::Credit)
        );
        assert_eq!(
            LedgerEntryType::from_str("refund"),
            Some(LedgerEntryType::Refund)
        );
        assert_eq!(LedgerEntryType::from_str("debit"), None);
    }
}
