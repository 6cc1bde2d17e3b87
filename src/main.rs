use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::{Any, AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use dhecash_gateway::api::{self, AppState};
use dhecash_gateway::cache::{init_cache_pool, CachePoolConfig, RedisStore};
use dhecash_gateway::config::AppConfig;
use dhecash_gateway::database::init_pool_from_config;
use dhecash_gateway::health::HealthChecker;
use dhecash_gateway::logging::init_tracing;
use dhecash_gateway::providers::factory::ProviderFactory;
use dhecash_gateway::queue::JobQueue;
use dhecash_gateway::services::callback_service::CallbackService;
use dhecash_gateway::services::idempotency::IdempotencyStore;
use dhecash_gateway::services::payment_orchestrator::PaymentOrchestrator;
use dhecash_gateway::services::payment_service::PaymentService;
use dhecash_gateway::services::refund_service::RefundService;
use dhecash_gateway::services::webhook_dispatcher::WebhookDispatcher;
use dhecash_gateway::workers::expiry_sweeper::ExpirySweeper;
use dhecash_gateway::workers::payment_worker::{spawn_payment_workers, PaymentDispatchHandler};
use dhecash_gateway::workers::webhook_worker::{spawn_webhook_worker, WebhookDeliveryHandler};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting DheCash gateway"
    );

    // Relational store: the only authoritative state.
    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;

    // Key/value store: tokens, idempotency cache, queue structures.
    let cache_pool = init_cache_pool(CachePoolConfig {
        redis_url: config.cache.redis_url.clone(),
        max_connections: config.cache.max_connections,
        ..Default::default()
    })
    .await
    .map_err(|e| {
        error!("Failed to initialize cache pool: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;
    let store = RedisStore::new(cache_pool);

    let queue = JobQueue::new(store.clone());
    let factory = Arc::new(ProviderFactory::new(&config, store.clone()));

    let dispatcher = Arc::new(WebhookDispatcher::new(
        db_pool.clone(),
        queue.clone(),
        config.webhooks.signing_secret.clone(),
        Duration::from_secs(config.webhooks.delivery_timeout_secs),
    ));
    let orchestrator = Arc::new(PaymentOrchestrator::new(
        db_pool.clone(),
        dispatcher.clone(),
    ));

    let state = Arc::new(AppState {
        pool: db_pool.clone(),
        auth: config.auth.clone(),
        payments: PaymentService::new(
            db_pool.clone(),
            queue.clone(),
            IdempotencyStore::new(store.clone()),
        ),
        refunds: RefundService::new(db_pool.clone(), factory.clone(), dispatcher.clone()),
        callbacks: CallbackService::new(db_pool.clone(), factory.clone(), orchestrator.clone()),
        health: HealthChecker::new(db_pool.clone(), store.clone()),
    });

    // Queue consumers and the expiry sweep share one shutdown signal.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    spawn_payment_workers(
        queue.clone(),
        Arc::new(PaymentDispatchHandler::new(
            db_pool.clone(),
            factory.clone(),
            orchestrator.clone(),
        )),
        shutdown_rx.clone(),
    );
    spawn_webhook_worker(
        queue.clone(),
        Arc::new(WebhookDeliveryHandler::new(dispatcher.clone())),
        shutdown_rx.clone(),
    );
    tokio::spawn(ExpirySweeper::new(db_pool.clone()).run(shutdown_rx.clone()));

    let cors_origins: Vec<HeaderValue> = config
        .server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(cors_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!(addr = %addr, "HTTP server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(shutdown_tx))
        .await?;

    info!("DheCash gateway stopped");
    Ok(())
}
