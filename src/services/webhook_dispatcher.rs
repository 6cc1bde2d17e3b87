//! Outbound webhook dispatcher.
//!
//! Dispatch writes one pending `webhook_logs` row per subscribed endpoint
//! and enqueues a delivery job carrying the log id, so concurrent deliveries
//! of the same event can never update each other's audit rows. Delivery
//! signs the stored payload with the endpoint's secret and POSTs it; any
//! non-2xx outcome surfaces as a job error so the queue retries.

use bigdecimal::ToPrimitive;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

use crate::database::payment_repository::Payment;
use crate::database::webhook_repository::{
    WebhookRepository, LOG_STATUS_DELIVERED, LOG_STATUS_PENDING,
};
use crate::error::AppResult;
use crate::providers::http::hmac_sha256_hex;
use crate::queue::{names, JobError, JobQueue, WEBHOOK_JOB_OPTIONS};

pub const API_VERSION: &str = "1.0";
pub const USER_AGENT_VALUE: &str = "DheCash-Webhooks/1.0";

/// Outbound event types.
pub mod events {
    pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const PAYMENT_CANCELLED: &str = "payment.cancelled";
    pub const PAYMENT_REFUNDED: &str = "payment.refunded";
}

/// Payload of one delivery job on `notifications.webhooks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDeliveryJob {
    pub log_id: i64,
    pub endpoint_id: i64,
    pub payment_id: i64,
    pub event_type: String,
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    pool: PgPool,
    queue: JobQueue,
    client: reqwest::Client,
    fallback_secret: String,
}

impl WebhookDispatcher {
    pub fn new(
        pool: PgPool,
        queue: JobQueue,
        fallback_secret: String,
        delivery_timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(delivery_timeout)
            .build()
            .expect("reqwest client builds with static configuration");

        Self {
            pool,
            queue,
            client,
            fallback_secret,
        }
    }

    /// Fan an event out to every active subscription of the owning merchant.
    /// Returns the number of deliveries enqueued.
    pub async fn dispatch(&self, payment: &Payment, event_type: &str) -> AppResult<usize> {
        let repo = WebhookRepository::new(self.pool.clone());
        let endpoints = repo.active_endpoints(payment.merchant_id).await?;

        let envelope = Self::build_envelope(payment, event_type);
        let mut enqueued = 0;

        for endpoint in endpoints {
            if !endpoint.subscribes_to(event_type) {
                continue;
            }

            let log = repo
                .insert_log(endpoint.id, payment.id, event_type, &envelope)
                .await?;

            let job = WebhookDeliveryJob {
                log_id: log.id,
                endpoint_id: endpoint.id,
                payment_id: payment.id,
                event_type: event_type.to_string(),
            };
            self.queue
                .enqueue(
                    names::NOTIFICATIONS_WEBHOOKS,
                    serde_json::to_value(&job).unwrap_or_default(),
                    WEBHOOK_JOB_OPTIONS,
                )
                .await
                .map_err(crate::error::AppError::from)?;
            enqueued += 1;
        }

        if enqueued > 0 {
            info!(
                payment = %payment.reference,
                event_type = event_type,
                deliveries = enqueued,
                "outbound webhooks enqueued"
            );
        }
        Ok(enqueued)
    }

    /// The signed notification envelope.
    pub fn build_envelope(payment: &Payment, event_type: &str) -> JsonValue {
        json!({
            "api_version": API_VERSION,
            "event_type": event_type,
            "created_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "data": {
                "payment_ref": payment.reference,
                "order_id": payment.order_id,
                "channel": payment.channel,
                "status": payment.status,
                "amount": payment.amount.to_f64(),
                "currency": payment.currency,
                "fee_amount": payment.fee_amount.to_f64(),
                "net_amount": payment.net_amount.to_f64(),
                "provider_transaction_id": payment.provider_transaction_id,
                "created_at": payment.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                "completed_at": payment.completed_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
                "failed_at": payment.failed_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
                "failure_reason": payment.failure_reason,
            }
        })
    }

    /// `t=<unix_ts>,v1=<hex hmac_sha256("{t}.{payload}")>`.
    pub fn signature_header(timestamp: i64, payload: &str, secret: &str) -> String {
        let signed_payload = format!("{}.{}", timestamp, payload);
        let digest = hmac_sha256_hex(signed_payload.as_bytes(), secret);
        format!("t={},v1={}", timestamp, digest)
    }

    /// Attempt one delivery. `attempt` is 1-indexed.
    pub async fn deliver(&self, job: &WebhookDeliveryJob, attempt: u32) -> Result<(), JobError> {
        let repo = WebhookRepository::new(self.pool.clone());

        let log = repo
            .find_log(job.log_id)
            .await?
            .ok_or_else(|| JobError::new(format!("webhook log {} not found", job.log_id)))?;

        // A redelivered job whose previous attempt actually landed.
        if log.status == LOG_STATUS_DELIVERED {
            return Ok(());
        }

        let endpoint = match repo.find_endpoint(job.endpoint_id).await? {
            Some(endpoint) if endpoint.is_active => endpoint,
            _ => {
                // Subscription removed or deactivated mid-flight; finalize
                // without retrying.
                warn!(log_id = job.log_id, "webhook endpoint gone, abandoning delivery");
                repo.mark_log_failed(job.log_id).await?;
                return Ok(());
            }
        };

        let payload = serde_json::to_string(&log.payload)
            .map_err(|e| JobError::new(format!("payload serialization failed: {}", e)))?;
        let secret = endpoint
            .secret
            .clone()
            .unwrap_or_else(|| self.fallback_secret.clone());

        let timestamp = Utc::now().timestamp();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if let Ok(value) = HeaderValue::from_str(&Self::signature_header(timestamp, &payload, &secret)) {
            headers.insert("DheCash-Signature", value);
        }
        if let Ok(value) = HeaderValue::from_str(&job.event_type) {
            headers.insert("DheCash-Event-Type", value);
        }
        if let Ok(value) = HeaderValue::from_str(&timestamp.to_string()) {
            headers.insert("DheCash-Timestamp", value);
        }

        let response = self
            .client
            .post(&endpoint.url)
            .headers(headers)
            .body(payload)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();

                if status.is_success() {
                    repo.record_attempt(
                        job.log_id,
                        LOG_STATUS_DELIVERED,
                        Some(status.as_u16() as i32),
                        Some(&body),
                        attempt as i32,
                    )
                    .await?;
                    info!(
                        log_id = job.log_id,
                        attempt = attempt,
                        status = status.as_u16(),
                        "webhook delivered"
                    );
                    Ok(())
                } else {
                    repo.record_attempt(
                        job.log_id,
                        LOG_STATUS_PENDING,
                        Some(status.as_u16() as i32),
                        Some(&body),
                        attempt as i32,
                    )
                    .await?;
                    Err(JobError::new(format!(
                        "webhook target returned HTTP {}",
                        status
                    )))
                }
            }
            Err(e) => {
                repo.record_attempt(
                    job.log_id,
                    LOG_STATUS_PENDING,
                    None,
                    Some(&e.to_string()),
                    attempt as i32,
                )
                .await?;
                Err(JobError::new(format!("webhook delivery failed: {}", e)))
            }
        }
    }

    /// Finalize the audit row after the last attempt has failed.
    pub async fn finalize_failed(&self, job: &WebhookDeliveryJob) {
        let repo = WebhookRepository::new(self.pool.clone());
        if let Err(e) = repo.mark_log_failed(job.log_id).await {
            warn!(log_id = job.log_id, error = %e, "failed to finalize webhook log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::http::verify_hmac_sha256_hex;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;
    use uuid::Uuid;

    fn payment() -> Payment {
        Payment {
            id: 7,
            reference: "pay_abc123".to_string(),
            merchant_id: Uuid::nil(),
            channel: "moncash".to_string(),
            status: "completed".to_string(),
            amount: BigDecimal::from_str("100.00").unwrap(),
            currency: "HTG".to_string(),
            fee_rate: BigDecimal::from_str("0.025").unwrap(),
            fee_amount: BigDecimal::from_str("2.50").unwrap(),
            net_amount: BigDecimal::from_str("97.50").unwrap(),
            refunded_amount: BigDecimal::from(0),
            provider_transaction_id: Some("ABC".to_string()),
            redirect_url: None,
            idempotency_key: None,
            customer_email: None,
            customer_phone: None,
            customer_name: None,
            customer_id: None,
            order_id: Some("O1".to_string()),
            metadata: None,
            failure_reason: None,
            expires_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: Some(Utc::now()),
            failed_at: None,
        }
    }

    #[test]
    fn envelope_carries_payment_snapshot() {
        let envelope = WebhookDispatcher::build_envelope(&payment(), events::PAYMENT_SUCCEEDED);
        assert_eq!(envelope["api_version"], "1.0");
        assert_eq!(envelope["event_type"], "payment.succeeded");
        assert_eq!(envelope["data"]["payment_ref"], "pay_abc123");
        assert_eq!(envelope["data"]["channel"], "moncash");
        assert_eq!(envelope["data"]["amount"], 100.0);
        assert_eq!(envelope["data"]["fee_amount"], 2.5);
        assert_eq!(envelope["data"]["net_amount"], 97.5);
        assert_eq!(envelope["data"]["order_id"], "O1");
    }

    #[test]
    fn signature_header_shape_and_verification() {
        let payload = r#"{"event":"payment.succeeded"}"#;
        let header = WebhookDispatcher::signature_header(1712000000, payload, "whsec");

        let (t_part, v1_part) = header.split_once(",v1=").unwrap();
        assert_eq!(t_part, "t=1712000000");

        let signed = format!("1712000000.{}", payload);
        assert!(verify_hmac_sha256_hex(signed.as_bytes(), "whsec", v1_part));
    }

    #[test]
    fn signature_changes_with_secret() {
        let payload = r#"{"event":"payment.succeeded"}"#;
        let a = WebhookDispatcher::signature_header(1712000000, payload, "secret-a");
        let b = WebhookDispatcher::signature_header(1712000000, payload, "secret-b");
        assert_ne!(a, b);
    }
}
