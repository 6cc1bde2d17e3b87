//! Durable Redis-backed job queue
//!
//! Per-channel FIFO queues with exponential-backoff retry, dead-letter
//! routing, and at-least-once delivery. Each queue is three Redis
//! structures: a ready list, a delayed sorted set scored by the wall-clock
//! millisecond a job becomes due, and a processing list holding in-flight
//! jobs. Workers reserve with RPOPLPUSH, ack with LREM, and reschedule by
//! moving the job back onto the delayed set with its attempt counter bumped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::keys::queue::{QueueKey, Segment};
use crate::cache::{CacheError, RedisStore};

/// Queue names.
pub mod names {
    use crate::providers::types::Channel;

    pub const PAYMENTS_MONCASH: &str = "payments.moncash";
    pub const PAYMENTS_NATCASH: &str = "payments.natcash";
    pub const PAYMENTS_STRIPE: &str = "payments.stripe";
    pub const PAYMENTS_DLQ: &str = "payments.dlq";
    pub const NOTIFICATIONS_WEBHOOKS: &str = "notifications.webhooks";

    pub fn payments_queue(channel: Channel) -> &'static str {
        match channel {
            Channel::Moncash => PAYMENTS_MONCASH,
            Channel::Natcash => PAYMENTS_NATCASH,
            Channel::Stripe => PAYMENTS_STRIPE,
        }
    }
}

/// Retry policy attached to a job at enqueue time.
#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

/// Payment dispatch jobs: 3 attempts, 2s/4s backoff.
pub const PAYMENT_JOB_OPTIONS: JobOptions = JobOptions {
    max_attempts: 3,
    backoff_base_ms: 2000,
};

/// Webhook delivery jobs: 5 attempts, 5s/10s/20s/40s backoff.
pub const WEBHOOK_JOB_OPTIONS: JobOptions = JobOptions {
    max_attempts: 5,
    backoff_base_ms: 5000,
};

/// Delay before retrying after the `attempt`-th failure (1-indexed):
/// `base * 2^(attempt-1)`.
pub fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(32))
}

/// A queued unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub payload: JsonValue,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(#[from] CacheError),

    #[error("job serialization error: {0}")]
    Serialization(String),
}

impl From<QueueError> for crate::error::AppError {
    fn from(err: QueueError) -> Self {
        use crate::error::{AppError, AppErrorKind, InfrastructureError};

        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Queue {
            message: err.to_string(),
        }))
    }
}

/// Error returned by a job handler. Any handler error reschedules the job
/// until its attempts budget is exhausted.
#[derive(Debug)]
pub struct JobError {
    pub message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<crate::providers::error::ProviderError> for JobError {
    fn from(err: crate::providers::error::ProviderError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<crate::database::error::DatabaseError> for JobError {
    fn from(err: crate::database::error::DatabaseError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<crate::error::AppError> for JobError {
    fn from(err: crate::error::AppError) -> Self {
        Self::new(err.to_string())
    }
}

/// What the queue did with a failed job.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDisposition {
    /// Rescheduled onto the delayed set.
    Rescheduled { delay_ms: u64 },
    /// Attempts exhausted; copied to the dead-letter queue.
    Buried,
    /// Attempts exhausted; dropped (no DLQ configured for this queue).
    Dropped,
}

#[derive(Clone)]
pub struct JobQueue {
    store: RedisStore,
}

impl JobQueue {
    pub fn new(store: RedisStore) -> Self {
        Self { store }
    }

    fn key(queue: &str, segment: Segment) -> String {
        QueueKey::new(queue, segment).to_string()
    }

    fn encode(job: &Job) -> Result<String, QueueError> {
        serde_json::to_string(job).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    fn decode(raw: &str) -> Result<Job, QueueError> {
        serde_json::from_str(raw).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    /// Enqueue a job for immediate processing.
    pub async fn enqueue(
        &self,
        queue: &str,
        payload: JsonValue,
        options: JobOptions,
    ) -> Result<Job, QueueError> {
        let job = Job {
            id: Uuid::new_v4().to_string(),
            queue: queue.to_string(),
            payload,
            attempts_made: 0,
            max_attempts: options.max_attempts,
            backoff_base_ms: options.backoff_base_ms,
            enqueued_at: Utc::now(),
        };

        self.store
            .list_push(&Self::key(queue, Segment::Ready), &Self::encode(&job)?)
            .await?;

        debug!(queue = queue, job_id = %job.id, "job enqueued");
        Ok(job)
    }

    /// Move jobs whose backoff has elapsed from the delayed set to the
    /// ready list.
    pub async fn promote_due(&self, queue: &str) -> Result<usize, QueueError> {
        let now_ms = Utc::now().timestamp_millis() as f64;
        let due = self
            .store
            .zset_pop_due(&Self::key(queue, Segment::Delayed), now_ms, 64)
            .await?;

        let count = due.len();
        for raw in due {
            self.store
                .list_push(&Self::key(queue, Segment::Ready), &raw)
                .await?;
        }

        if count > 0 {
            debug!(queue = queue, promoted = count, "promoted delayed jobs");
        }
        Ok(count)
    }

    /// Reserve the oldest ready job. The raw string must be passed back to
    /// `ack` or `retry_or_bury` so the in-flight copy can be released.
    pub async fn reserve(&self, queue: &str) -> Result<Option<(Job, String)>, QueueError> {
        let raw = self
            .store
            .list_move_tail(
                &Self::key(queue, Segment::Ready),
                &Self::key(queue, Segment::Processing),
            )
            .await?;

        match raw {
            Some(raw) => {
                let job = Self::decode(&raw)?;
                Ok(Some((job, raw)))
            }
            None => Ok(None),
        }
    }

    /// Acknowledge successful processing.
    pub async fn ack(&self, queue: &str, raw: &str) -> Result<(), QueueError> {
        self.store
            .list_remove(&Self::key(queue, Segment::Processing), raw)
            .await?;
        Ok(())
    }

    /// Handle a failed attempt: reschedule with exponential backoff, or on
    /// exhaustion copy the job (data preserved) to the dead-letter queue.
    pub async fn retry_or_bury(
        &self,
        queue: &str,
        job: &Job,
        raw: &str,
        dead_letter_queue: Option<&str>,
    ) -> Result<RetryDisposition, QueueError> {
        self.store
            .list_remove(&Self::key(queue, Segment::Processing), raw)
            .await?;

        let mut failed = job.clone();
        failed.attempts_made += 1;

        if failed.attempts_made < failed.max_attempts {
            let delay_ms = backoff_delay_ms(failed.backoff_base_ms, failed.attempts_made);
            let due_at = Utc::now().timestamp_millis() as f64 + delay_ms as f64;
            self.store
                .zset_add(
                    &Self::key(queue, Segment::Delayed),
                    &Self::encode(&failed)?,
                    due_at,
                )
                .await?;

            warn!(
                queue = queue,
                job_id = %failed.id,
                attempt = failed.attempts_made,
                delay_ms = delay_ms,
                "job failed, rescheduled"
            );
            return Ok(RetryDisposition::Rescheduled { delay_ms });
        }

        match dead_letter_queue {
            Some(dlq) => {
                let mut buried = failed.clone();
                buried.queue = dlq.to_string();
                self.store
                    .list_push(&Self::key(dlq, Segment::Ready), &Self::encode(&buried)?)
                    .await?;

                error!(
                    queue = queue,
                    dlq = dlq,
                    job_id = %failed.id,
                    attempts = failed.attempts_made,
                    "job exhausted retries, moved to dead-letter queue"
                );
                Ok(RetryDisposition::Buried)
            }
            None => {
                error!(
                    queue = queue,
                    job_id = %failed.id,
                    attempts = failed.attempts_made,
                    "job exhausted retries, abandoned"
                );
                Ok(RetryDisposition::Dropped)
            }
        }
    }

    pub async fn depth(&self, queue: &str) -> Result<u64, QueueError> {
        Ok(self
            .store
            .list_len(&Self::key(queue, Segment::Ready))
            .await?)
    }
}

/// A queue consumer's wiring.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub queue: &'static str,
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub dead_letter_queue: Option<&'static str>,
}

/// Handles jobs from one queue.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &Job) -> Result<(), JobError>;

    /// Called once after a job's final attempt has failed.
    async fn on_exhausted(&self, _job: &Job) {}
}

/// Run a consumer loop until shutdown: promote due jobs, reserve ready
/// ones, and process each on its own task bounded by a semaphore.
pub async fn run_worker(
    queue: JobQueue,
    config: WorkerConfig,
    handler: Arc<dyn JobHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(
        queue = config.queue,
        concurrency = config.concurrency,
        "queue worker started"
    );

    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let mut ticker = tokio::time::interval(config.poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        if let Err(e) = queue.promote_due(config.queue).await {
            error!(queue = config.queue, error = %e, "failed to promote delayed jobs");
            continue;
        }

        loop {
            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                break;
            };

            let reserved = match queue.reserve(config.queue).await {
                Ok(Some(reserved)) => reserved,
                Ok(None) => break,
                Err(e) => {
                    error!(queue = config.queue, error = %e, "failed to reserve job");
                    break;
                }
            };

            let (job, raw) = reserved;
            let queue = queue.clone();
            let handler = handler.clone();
            let worker = config.clone();

            tokio::spawn(async move {
                let _permit = permit;
                match handler.handle(&job).await {
                    Ok(()) => {
                        if let Err(e) = queue.ack(worker.queue, &raw).await {
                            error!(queue = worker.queue, job_id = %job.id, error = %e, "failed to ack job");
                        }
                    }
                    Err(job_err) => {
                        warn!(
                            queue = worker.queue,
                            job_id = %job.id,
                            error = %job_err,
                            "job handler failed"
                        );
                        match queue
                            .retry_or_bury(worker.queue, &job, &raw, worker.dead_letter_queue)
                            .await
                        {
                            Ok(RetryDisposition::Buried) | Ok(RetryDisposition::Dropped) => {
                                handler.on_exhausted(&job).await;
                            }
                            Ok(RetryDisposition::Rescheduled { .. }) => {}
                            Err(e) => {
                                error!(queue = worker.queue, job_id = %job.id, error = %e, "failed to reschedule job");
                            }
                        }
                    }
                }
            });
        }
    }

    info!(queue = config.queue, "queue worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_backoff_schedule() {
        let base = PAYMENT_JOB_OPTIONS.backoff_base_ms;
        assert_eq!(backoff_delay_ms(base, 1), 2000);
        assert_eq!(backoff_delay_ms(base, 2), 4000);
        assert_eq!(backoff_delay_ms(base, 3), 8000);
    }

    #[test]
    fn webhook_backoff_schedule() {
        let base = WEBHOOK_JOB_OPTIONS.backoff_base_ms;
        let delays: Vec<u64> = (1..=5).map(|n| backoff_delay_ms(base, n)).collect();
        assert_eq!(delays, vec![5000, 10000, 20000, 40000, 80000]);
        // Cumulative wait across the full schedule.
        assert!(delays.iter().sum::<u64>() >= 155_000);
    }

    #[test]
    fn queue_name_per_channel() {
        use crate::providers::types::Channel;
        assert_eq!(names::payments_queue(Channel::Moncash), "payments.moncash");
        assert_eq!(names::payments_queue(Channel::Natcash), "payments.natcash");
        assert_eq!(names::payments_queue(Channel::Stripe), "payments.stripe");
    }

    #[test]
    fn job_round_trips_through_json() {
        let job = Job {
            id: "j1".to_string(),
            queue: names::PAYMENTS_MONCASH.to_string(),
            payload: serde_json::json!({"payment_id": 7}),
            attempts_made: 1,
            max_attempts: 3,
            backoff_base_ms: 2000,
            enqueued_at: Utc::now(),
        };
        let raw = JobQueue::encode(&job).unwrap();
        let decoded = JobQueue::decode(&raw).unwrap();
        assert_eq!(decoded.id, "j1");
        assert_eq!(decoded.attempts_made, 1);
        assert_eq!(decoded.payload["payment_id"], 7);
    }
}
