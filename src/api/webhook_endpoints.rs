use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::SecondsFormat;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use crate::api::AppState;
use crate::database::webhook_repository::{WebhookEndpoint, WebhookRepository};
use crate::error::AppError;
use crate::middleware::auth::MerchantAuth;

#[derive(Debug, Deserialize)]
pub struct CreateEndpointBody {
    pub url: String,
    pub events: Vec<String>,
    pub secret: Option<String>,
}

fn endpoint_view(endpoint: &WebhookEndpoint) -> JsonValue {
    json!({
        "id": endpoint.id,
        "url": endpoint.url,
        "events": endpoint.events,
        "is_active": endpoint.is_active,
        "created_at": endpoint.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}

/// POST /v1/webhook-endpoints
pub async fn create_endpoint(
    State(state): State<Arc<AppState>>,
    auth: MerchantAuth,
    Json(body): Json<CreateEndpointBody>,
) -> Result<impl IntoResponse, AppError> {
    if !body.url.starts_with("http://") && !body.url.starts_with("https://") {
        return Err(AppError::validation("url must be an http(s) URL", Some("url")));
    }
    if body.events.is_empty() {
        return Err(AppError::validation(
            "at least one event type is required",
            Some("events"),
        ));
    }

    let repo = WebhookRepository::new(state.pool.clone());
    let endpoint = repo
        .insert_endpoint(
            auth.merchant_id,
            &body.url,
            &body.events,
            body.secret.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(endpoint_view(&endpoint))))
}

/// GET /v1/webhook-endpoints
pub async fn list_endpoints(
    State(state): State<Arc<AppState>>,
    auth: MerchantAuth,
) -> Result<impl IntoResponse, AppError> {
    let repo = WebhookRepository::new(state.pool.clone());
    let endpoints = repo.list_endpoints(auth.merchant_id).await?;
    let data: Vec<_> = endpoints.iter().map(endpoint_view).collect();
    Ok(Json(json!({ "data": data })))
}
