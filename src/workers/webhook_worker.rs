//! Outbound webhook delivery worker.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::error;

use crate::queue::{names, run_worker, Job, JobError, JobHandler, JobQueue, WorkerConfig};
use crate::services::webhook_dispatcher::{WebhookDeliveryJob, WebhookDispatcher};

/// In-flight delivery cap for the webhook worker.
const WEBHOOK_WORKER_CONCURRENCY: usize = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct WebhookDeliveryHandler {
    dispatcher: Arc<WebhookDispatcher>,
}

impl WebhookDeliveryHandler {
    pub fn new(dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait::async_trait]
impl JobHandler for WebhookDeliveryHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        let delivery: WebhookDeliveryJob = serde_json::from_value(job.payload.clone())
            .map_err(|e| JobError::new(format!("malformed delivery job: {}", e)))?;

        let attempt = job.attempts_made + 1;
        self.dispatcher.deliver(&delivery, attempt).await
    }

    async fn on_exhausted(&self, job: &Job) {
        // No dead-letter queue for webhooks; the final failure lives on the
        // log row.
        match serde_json::from_value::<WebhookDeliveryJob>(job.payload.clone()) {
            Ok(delivery) => self.dispatcher.finalize_failed(&delivery).await,
            Err(e) => error!(job_id = %job.id, error = %e, "exhausted delivery job has malformed payload"),
        }
    }
}

pub fn spawn_webhook_worker(
    queue: JobQueue,
    handler: Arc<WebhookDeliveryHandler>,
    shutdown_rx: watch::Receiver<bool>,
) {
    let config = WorkerConfig {
        queue: names::NOTIFICATIONS_WEBHOOKS,
        concurrency: WEBHOOK_WORKER_CONCURRENCY,
        poll_interval: POLL_INTERVAL,
        dead_letter_queue: None,
    };
    tokio::spawn(run_worker(queue, config, handler, shutdown_rx));
}
