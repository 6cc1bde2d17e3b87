use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

/// Per-merchant outbound webhook subscription.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEndpoint {
    pub id: i64,
    pub merchant_id: Uuid,
    pub url: String,
    /// Subscribed event types; `*` subscribes to everything.
    pub events: Vec<String>,
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.events.iter().any(|e| e == "*" || e == event_type)
    }
}

/// One delivery-attempt audit row.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookLog {
    pub id: i64,
    pub webhook_endpoint_id: i64,
    pub payment_id: i64,
    pub event_type: String,
    pub payload: JsonValue,
    pub status: String,
    pub http_status: Option<i32>,
    pub response_body: Option<String>,
    pub attempt_count: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub const LOG_STATUS_PENDING: &str = "pending";
pub const LOG_STATUS_DELIVERED: &str = "delivered";
pub const LOG_STATUS_FAILED: &str = "failed";

/// Response bodies are trimmed to this length before being persisted.
pub const RESPONSE_BODY_CAP: usize = 500;

const ENDPOINT_COLUMNS: &str = "id, merchant_id, url, events, secret, is_active, created_at";
const LOG_COLUMNS: &str = "id, webhook_endpoint_id, payment_id, event_type, payload, status, \
     http_status, response_body, attempt_count, last_attempt_at, delivered_at, created_at";

pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_endpoint(
        &self,
        merchant_id: Uuid,
        url: &str,
        events: &[String],
        secret: Option<&str>,
    ) -> Result<WebhookEndpoint, DatabaseError> {
        let sql = format!(
            "INSERT INTO webhook_endpoints (merchant_id, url, events, secret, is_active) \
             VALUES ($1, $2, $3, $4, true) \
             RETURNING {ENDPOINT_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookEndpoint>(&sql)
            .bind(merchant_id)
            .bind(url)
            .bind(events)
            .bind(secret)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_endpoints(
        &self,
        merchant_id: Uuid,
    ) -> Result<Vec<WebhookEndpoint>, DatabaseError> {
        let sql = format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints \
             WHERE merchant_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, WebhookEndpoint>(&sql)
            .bind(merchant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Active subscriptions of a merchant; event filtering happens in code
    /// because `*` wildcards live inside the array column.
    pub async fn active_endpoints(
        &self,
        merchant_id: Uuid,
    ) -> Result<Vec<WebhookEndpoint>, DatabaseError> {
        let sql = format!(
            "SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints \
             WHERE merchant_id = $1 AND is_active = true"
        );
        sqlx::query_as::<_, WebhookEndpoint>(&sql)
            .bind(merchant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_endpoint(&self, id: i64) -> Result<Option<WebhookEndpoint>, DatabaseError> {
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM webhook_endpoints WHERE id = $1");
        sqlx::query_as::<_, WebhookEndpoint>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn insert_log(
        &self,
        webhook_endpoint_id: i64,
        payment_id: i64,
        event_type: &str,
        payload: &JsonValue,
    ) -> Result<WebhookLog, DatabaseError> {
        let sql = format!(
            "INSERT INTO webhook_logs \
                 (webhook_endpoint_id, payment_id, event_type, payload, status, attempt_count) \
             VALUES ($1, $2, $3, $4, 'pending', 0) \
             RETURNING {LOG_COLUMNS}"
        );
        sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(webhook_endpoint_id)
            .bind(payment_id)
            .bind(event_type)
            .bind(payload)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_log(&self, id: i64) -> Result<Option<WebhookLog>, DatabaseError> {
        let sql = format!("SELECT {LOG_COLUMNS} FROM webhook_logs WHERE id = $1");
        sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Record the outcome of one delivery attempt. `delivered_at` is only
    /// set when `status` is `delivered`.
    pub async fn record_attempt(
        &self,
        id: i64,
        status: &str,
        http_status: Option<i32>,
        response_body: Option<&str>,
        attempt_count: i32,
    ) -> Result<(), DatabaseError> {
        let trimmed = response_body.map(|body| {
            let mut capped: String = body.chars().take(RESPONSE_BODY_CAP).collect();
            capped.shrink_to_fit();
            capped
        });

        sqlx::query(
            "UPDATE webhook_logs \
             SET status = $2, http_status = $3, response_body = $4, attempt_count = $5, \
                 last_attempt_at = NOW(), \
                 delivered_at = CASE WHEN $2 = 'delivered' THEN NOW() ELSE delivered_at END \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(http_status)
        .bind(trimmed)
        .bind(attempt_count)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Finalize a log row whose delivery attempts are exhausted. Delivered
    /// rows are never downgraded.
    pub async fn mark_log_failed(&self, id: i64) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE webhook_logs SET status = 'failed' WHERE id = $1 AND status != 'delivered'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    pub async fn list_logs_for_payment(
        &self,
        payment_id: i64,
    ) -> Result<Vec<WebhookLog>, DatabaseError> {
        let sql = format!(
            "SELECT {LOG_COLUMNS} FROM webhook_logs WHERE payment_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, WebhookLog>(&sql)
            .bind(payment_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(events: Vec<&str>) -> WebhookEndpoint {
        WebhookEndpoint {
            id: 1,
            merchant_id: Uuid::nil(),
            url: "https://merchant.example/hooks".to_string(),
            events: events.into_iter().map(String::from).collect(),
            secret: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn wildcard_subscribes_to_everything() {
        let ep = endpoint(vec!["*"]);
        assert!(ep.subscribes_to("payment.succeeded"));
        assert!(ep.subscribes_to("payment.refunded"));
    }

    #[test]
    fn explicit_subscription_is_exact() {
        let ep = endpoint(vec!["payment.succeeded", "payment.failed"]);
        assert!(ep.subscribes_to("payment.succeeded"));
        assert!(!ep.subscribes_to("payment.refunded"));
    }
}
