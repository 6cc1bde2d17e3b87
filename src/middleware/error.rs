//! Error response formatting
//!
//! Every error leaving the HTTP surface is rendered as
//! `{ "error": { "code", "message", "details"? } }` with the status code the
//! taxonomy assigns. Server errors are logged with their full shape; the
//! client only ever sees the stable code and message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorCode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// The error envelope returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: ErrorBody {
                code: error.error_code(),
                message: error.user_message(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "server error"
            );
        } else {
            tracing::warn!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "client error"
            );
        }

        let body = ErrorResponse::from_app_error(&self);
        (status_code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppErrorKind, PaymentDomainError};

    #[test]
    fn envelope_shape_matches_contract() {
        let err = AppError::new(AppErrorKind::Payment(PaymentDomainError::RefundExceedsAmount {
            reference: "pay_x".to_string(),
        }));
        let body = ErrorResponse::from_app_error(&err);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["error"]["code"], "REFUND_EXCEEDS_AMOUNT");
        assert!(json["error"]["message"].is_string());
        assert!(json["error"].get("details").is_none());
    }

    #[test]
    fn details_are_attached_when_present() {
        let err = AppError::validation("bad amount", Some("amount"));
        let body = ErrorResponse::from_app_error(&err)
            .with_details(serde_json::json!({"field": "amount"}));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["details"]["field"], "amount");
    }

    #[test]
    fn into_response_uses_taxonomy_status() {
        let err = AppError::new(AppErrorKind::Payment(PaymentDomainError::NotFound {
            reference: "pay_x".to_string(),
        }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
