//! Payment dispatch workers.
//!
//! One consumer per channel queue pulls dispatch jobs, calls the provider
//! adapter, and records the returned handle on the payment (`processing`).
//! Provider failures are rethrown so the queue retries; when the attempts
//! budget is gone the job is dead-lettered and the payment marked failed.

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::database::payment_repository::{PaymentRepository, PaymentStatus};
use crate::providers::factory::ProviderFactory;
use crate::providers::types::{Channel, CreatePaymentRequest};
use crate::queue::{
    names, run_worker, Job, JobError, JobHandler, JobQueue, WorkerConfig,
};
use crate::services::payment_orchestrator::PaymentOrchestrator;
use crate::services::payment_service::DispatchPaymentJob;
use std::str::FromStr;

/// In-flight job cap per payment worker.
const PAYMENT_WORKER_CONCURRENCY: usize = 5;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct PaymentDispatchHandler {
    pool: PgPool,
    factory: Arc<ProviderFactory>,
    orchestrator: Arc<PaymentOrchestrator>,
}

impl PaymentDispatchHandler {
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
}

#[async_trait::async_trait]
impl JobHandler for PaymentDispatchHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        let dispatch: DispatchPaymentJob = serde_json::from_value(job.payload.clone())
            .map_err(|e| JobError::new(format!("malformed dispatch job: {}", e)))?;

        let repo = PaymentRepository::new(self.pool.clone());
        let Some(payment) = repo.find_by_id(dispatch.payment_id).await? else {
            warn!(payment_id = dispatch.payment_id, "dispatch job references unknown payment");
            return Ok(());
        };

        // At-least-once delivery: a redelivered job for an already-dispatched
        // payment is a no-op.
        if payment.status() != PaymentStatus::Pending {
            info!(
                payment = %payment.reference,
                status = %payment.status,
                "payment already dispatched, skipping"
            );
            return Ok(());
        }

        let channel = Channel::from_str(&payment.channel)?;
        let adapter = self.factory.get_provider(channel)?;

        let response = adapter
            .create_payment(CreatePaymentRequest {
                amount: payment.amount.clone(),
                currency: payment.currency.clone(),
                order_id: payment.order_id.clone(),
                payment_reference: payment.reference.clone(),
                customer_phone: payment.customer_phone.clone(),
                customer_email: payment.customer_email.clone(),
                description: None,
            })
            .await?;

        let applied = repo
            .mark_processing(
                payment.id,
                &response.provider_transaction_id,
                response.redirect_url.as_deref(),
            )
            .await?;

        if applied {
            info!(
                payment = %payment.reference,
                provider_transaction_id = %response.provider_transaction_id,
                "payment dispatched to provider"
            );
        } else {
            // A concurrent delivery won the race; the provider handle it
            // recorded stands.
            warn!(payment = %payment.reference, "payment left pending state mid-dispatch");
        }

        Ok(())
    }

    async fn on_exhausted(&self, job: &Job) {
        let Ok(dispatch) = serde_json::from_value::<DispatchPaymentJob>(job.payload.clone())
        else {
            error!(job_id = %job.id, "exhausted dispatch job has malformed payload");
            return;
        };

        if let Err(e) = self
            .orchestrator
            .fail_after_exhaustion(
                dispatch.payment_id,
                "payment could not be submitted to the provider",
            )
            .await
        {
            error!(
                payment_id = dispatch.payment_id,
                error = %e,
                "failed to mark exhausted payment as failed"
            );
        }
    }
}

/// Spawn one consumer per channel queue. All route exhausted jobs to
/// `payments.dlq`.
pub fn spawn_payment_workers(
    queue: JobQueue,
    handler: Arc<PaymentDispatchHandler>,
    shutdown_rx: watch::Receiver<bool>,
) {
    for queue_name in [
        names::PAYMENTS_MONCASH,
        names::PAYMENTS_NATCASH,
        names::PAYMENTS_STRIPE,
    ] {
        let config = WorkerConfig {
            queue: queue_name,
            concurrency: PAYMENT_WORKER_CONCURRENCY,
            poll_interval: POLL_INTERVAL,
            dead_letter_queue: Some(names::PAYMENTS_DLQ),
        };
        tokio::spawn(run_worker(
            queue.clone(),
            config,
            handler.clone(),
            shutdown_rx.clone(),
        ));
    }
}
