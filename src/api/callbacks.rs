use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::api::AppState;
use crate::error::AppError;

/// POST /v1/webhooks/:provider
///
/// The body is taken as raw bytes so Stripe's signature check sees exactly
/// what was sent on the wire; parsing happens inside the adapter after
/// verification. Success and ignorable conditions both return 200 so
/// providers stop retrying; verification failures surface as 400 before any
/// state change.
pub async fn provider_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    info!(provider = %provider, bytes = body.len(), "provider callback received");

    state.callbacks.process(&provider, &headers, &body).await?;

    Ok(Json(json!({ "received": true })))
}
