//! Background sweep flipping stale `pending` payments to `expired`.

use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::database::payment_repository::PaymentRepository;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct ExpirySweeper {
    pool: PgPool,
}

impl ExpirySweeper {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("expiry sweeper started");
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let repo = PaymentRepository::new(self.pool.clone());
                    match repo.expire_stale(Utc::now()).await {
                        Ok(expired) if expired > 0 => {
                            info!(expired = expired, "expired stale pending payments");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(error = %e, "expiry sweep failed");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("expiry sweeper stopped");
    }
}
