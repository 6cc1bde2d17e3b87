use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::api::AppState;
use crate::error::AppError;
use crate::middleware::auth::MerchantAuth;
use crate::services::payment_service::{payment_view, CreatePaymentInput, ListPaymentsQuery};
use crate::services::refund_service::RefundInput;

/// POST /v1/payments
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    auth: MerchantAuth,
    headers: HeaderMap,
    Json(input): Json<CreatePaymentInput>,
) -> Result<impl IntoResponse, AppError> {
    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from);

    let body = state
        .payments
        .create(auth.merchant_id, input, idempotency_key)
        .await?;

    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /v1/payments/:reference
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    auth: MerchantAuth,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let payment = state.payments.get(auth.merchant_id, &reference).await?;
    Ok(Json(payment_view(&payment)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub channel: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// GET /v1/payments
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    auth: MerchantAuth,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let (payments, next_cursor) = state
        .payments
        .list(
            auth.merchant_id,
            ListPaymentsQuery {
                status: params.status,
                channel: params.channel,
                from: params.from,
                to: params.to,
                cursor: params.cursor,
                limit: params.limit,
            },
        )
        .await?;

    let data: Vec<_> = payments.iter().map(payment_view).collect();
    Ok(Json(json!({
        "data": data,
        "next_cursor": next_cursor,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RefundBody {
    pub amount: BigDecimal,
    pub reason: Option<String>,
}

/// POST /v1/payments/:reference/refund
pub async fn refund_payment(
    State(state): State<Arc<AppState>>,
    auth: MerchantAuth,
    Path(reference): Path<String>,
    Json(body): Json<RefundBody>,
) -> Result<impl IntoResponse, AppError> {
    let payment = state
        .refunds
        .refund(
            auth.merchant_id,
            &reference,
            RefundInput {
                amount: body.amount,
                reason: body.reason,
            },
        )
        .await?;

    Ok(Json(payment_view(&payment)))
}

/// GET /v1/checkout/:reference — unauthenticated read for the hosted page.
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.payments.checkout_view(&reference).await?;
    Ok(Json(view))
}
