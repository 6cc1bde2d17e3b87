pub mod callbacks;
pub mod payments;
pub mod webhook_endpoints;

use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::health::HealthChecker;
use crate::services::callback_service::CallbackService;
use crate::services::payment_service::PaymentService;
use crate::services::refund_service::RefundService;

/// Shared state handed to every handler.
pub struct AppState {
    pub pool: PgPool,
    pub auth: AuthConfig,
    pub payments: PaymentService,
    pub refunds: RefundService,
    pub callbacks: CallbackService,
    pub health: HealthChecker,
}

/// The public HTTP surface.
///
/// Callback routes are registered without any rate limiting; providers
/// retry aggressively and throttling them would drop legitimate
/// notifications.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/payments",
            post(payments::create_payment).get(payments::list_payments),
        )
        .route("/v1/payments/:reference", get(payments::get_payment))
        .route(
            "/v1/payments/:reference/refund",
            post(payments::refund_payment),
        )
        .route("/v1/checkout/:reference", get(payments::checkout))
        .route("/v1/webhooks/:provider", post(callbacks::provider_callback))
        .route(
            "/v1/webhook-endpoints",
            post(webhook_endpoints::create_endpoint).get(webhook_endpoints::list_endpoints),
        )
        .with_state(state)
}

async fn health(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> impl axum::response::IntoResponse {
    let status = state.health.check_health().await;
    let code = if status.is_healthy() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (code, axum::Json(status))
}
