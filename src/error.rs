//! Unified error system for the gateway
//!
//! Every failure surfaces as an [`AppError`] with a stable machine-readable
//! [`ErrorCode`], an HTTP status mapping, and a user-facing message. Layer
//! errors (database, cache, queue, provider) convert into it at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes surfaced to clients verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired,
    #[serde(rename = "INVALID_CREDENTIALS")]
    InvalidCredentials,
    #[serde(rename = "TOKEN_EXPIRED")]
    TokenExpired,
    #[serde(rename = "TOKEN_INVALID")]
    TokenInvalid,
    #[serde(rename = "INSUFFICIENT_PERMISSIONS")]
    InsufficientPermissions,
    #[serde(rename = "API_KEY_INVALID")]
    ApiKeyInvalid,
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "PAYMENT_NOT_FOUND")]
    PaymentNotFound,
    #[serde(rename = "PAYMENT_EXPIRED")]
    PaymentExpired,
    #[serde(rename = "REFUND_NOT_ALLOWED")]
    RefundNotAllowed,
    #[serde(rename = "REFUND_EXCEEDS_AMOUNT")]
    RefundExceedsAmount,
    #[serde(rename = "IDEMPOTENCY_CONFLICT")]
    IdempotencyConflict,
    #[serde(rename = "PROVIDER_ERROR")]
    ProviderError,
    #[serde(rename = "PROVIDER_TIMEOUT")]
    ProviderTimeout,
    #[serde(rename = "PROVIDER_UNAVAILABLE")]
    ProviderUnavailable,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Authentication / authorization failures at the trust boundary
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No credentials presented
    MissingCredentials,
    /// Username/password style credentials rejected
    InvalidCredentials,
    /// JWT past its expiry
    TokenExpired,
    /// JWT malformed or signature mismatch
    TokenInvalid,
    /// Authenticated but not allowed to touch the resource
    InsufficientPermissions,
    /// API key unknown or revoked
    ApiKeyInvalid,
}

/// Domain errors on the payment lifecycle
#[derive(Debug, Clone)]
pub enum PaymentDomainError {
    NotFound { reference: String },
    Expired { reference: String },
    RefundNotAllowed { reference: String, status: String },
    RefundExceedsAmount { reference: String },
    IdempotencyConflict { key: String },
}

/// Infrastructure-level errors (database, cache, queue, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Cache { message: String },
    Queue { message: String },
    Configuration { message: String },
}

/// External payment-processor errors
#[derive(Debug, Clone)]
pub enum ExternalError {
    Provider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    ProviderTimeout {
        provider: String,
        timeout_secs: u64,
    },
    ProviderUnavailable {
        provider: String,
    },
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
    pub field: Option<String>,
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Auth(AuthError),
    Payment(PaymentDomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError {
            message: message.into(),
            field: field.map(|f| f.to_string()),
        }))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Auth(err) => match err {
                AuthError::MissingCredentials => 401,
                AuthError::InvalidCredentials => 401,
                AuthError::TokenExpired => 401,
                AuthError::TokenInvalid => 401,
                AuthError::InsufficientPermissions => 403,
                AuthError::ApiKeyInvalid => 401,
            },
            AppErrorKind::Payment(err) => match err {
                PaymentDomainError::NotFound { .. } => 404,
                PaymentDomainError::Expired { .. } => 410,
                PaymentDomainError::RefundNotAllowed { .. } => 422,
                PaymentDomainError::RefundExceedsAmount { .. } => 422,
                PaymentDomainError::IdempotencyConflict { .. } => 409,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::Provider { .. } => 502,
                ExternalError::ProviderTimeout { .. } => 504,
                ExternalError::ProviderUnavailable { .. } => 503,
                ExternalError::RateLimit { .. } => 429,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Auth(err) => match err {
                AuthError::MissingCredentials => ErrorCode::AuthRequired,
                AuthError::InvalidCredentials => ErrorCode::InvalidCredentials,
                AuthError::TokenExpired => ErrorCode::TokenExpired,
                AuthError::TokenInvalid => ErrorCode::TokenInvalid,
                AuthError::InsufficientPermissions => ErrorCode::InsufficientPermissions,
                AuthError::ApiKeyInvalid => ErrorCode::ApiKeyInvalid,
            },
            AppErrorKind::Payment(err) => match err {
                PaymentDomainError::NotFound { .. } => ErrorCode::PaymentNotFound,
                PaymentDomainError::Expired { .. } => ErrorCode::PaymentExpired,
                PaymentDomainError::RefundNotAllowed { .. } => ErrorCode::RefundNotAllowed,
                PaymentDomainError::RefundExceedsAmount { .. } => ErrorCode::RefundExceedsAmount,
                PaymentDomainError::IdempotencyConflict { .. } => ErrorCode::IdempotencyConflict,
            },
            AppErrorKind::Infrastructure(_) => ErrorCode::InternalError,
            AppErrorKind::External(err) => match err {
                ExternalError::Provider { .. } => ErrorCode::ProviderError,
                ExternalError::ProviderTimeout { .. } => ErrorCode::ProviderTimeout,
                ExternalError::ProviderUnavailable { .. } => ErrorCode::ProviderUnavailable,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitExceeded,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Auth(err) => match err {
                AuthError::MissingCredentials => "Authentication is required".to_string(),
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::TokenExpired => "Authentication token has expired".to_string(),
                AuthError::TokenInvalid => "Authentication token is invalid".to_string(),
                AuthError::InsufficientPermissions => {
                    "You do not have permission to perform this action".to_string()
                }
                AuthError::ApiKeyInvalid => "Invalid or revoked API key".to_string(),
            },
            AppErrorKind::Payment(err) => match err {
                PaymentDomainError::NotFound { reference } => {
                    format!("Payment '{}' not found", reference)
                }
                PaymentDomainError::Expired { reference } => {
                    format!("Payment '{}' has expired", reference)
                }
                PaymentDomainError::RefundNotAllowed { reference, status } => {
                    format!(
                        "Payment '{}' cannot be refunded in status '{}'",
                        reference, status
                    )
                }
                PaymentDomainError::RefundExceedsAmount { reference } => {
                    format!(
                        "Refund exceeds the refundable balance of payment '{}'",
                        reference
                    )
                }
                PaymentDomainError::IdempotencyConflict { key } => {
                    format!("Idempotency key '{}' was reused with a different request", key)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::Provider { provider, is_retryable, .. } => {
                    if *is_retryable {
                        format!(
                            "Payment provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        "Payment processing failed. Please contact support".to_string()
                    }
                }
                ExternalError::ProviderTimeout { provider, timeout_secs } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        provider, timeout_secs
                    )
                }
                ExternalError::ProviderUnavailable { provider } => {
                    format!("Payment provider ({}) is not configured or unavailable", provider)
                }
                ExternalError::RateLimit { service, retry_after } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!("Rate limit exceeded for {}. Please try again later", service)
                    }
                }
            },
            AppErrorKind::Validation(err) => match &err.field {
                Some(field) => format!("Invalid value for '{}': {}", field, err.message),
                None => err.message.clone(),
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Auth(_) => false,
            AppErrorKind::Payment(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Cache { .. } => true,
                InfrastructureError::Queue { .. } => true,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Provider { is_retryable, .. } => *is_retryable,
                ExternalError::ProviderTimeout { .. } => true,
                ExternalError::ProviderUnavailable { .. } => true,
                ExternalError::RateLimit { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::RefundExceedsAmount).unwrap();
        assert_eq!(json, "\"REFUND_EXCEEDS_AMOUNT\"");
        let json = serde_json::to_string(&ErrorCode::ProviderTimeout).unwrap();
        assert_eq!(json, "\"PROVIDER_TIMEOUT\"");
    }

    #[test]
    fn test_payment_error_status_mapping() {
        let not_found = AppError::new(AppErrorKind::Payment(PaymentDomainError::NotFound {
            reference: "pay_x".to_string(),
        }));
        assert_eq!(not_found.status_code(), 404);
        assert_eq!(not_found.error_code(), ErrorCode::PaymentNotFound);

        let expired = AppError::new(AppErrorKind::Payment(PaymentDomainError::Expired {
            reference: "pay_x".to_string(),
        }));
        assert_eq!(expired.status_code(), 410);

        let over_refund = AppError::new(AppErrorKind::Payment(
            PaymentDomainError::RefundExceedsAmount {
                reference: "pay_x".to_string(),
            },
        ));
        assert_eq!(over_refund.status_code(), 422);
        assert!(!over_refund.is_retryable());
    }

    #[test]
    fn test_external_error_status_mapping() {
        let timeout = AppError::new(AppErrorKind::External(ExternalError::ProviderTimeout {
            provider: "moncash".to_string(),
            timeout_secs: 30,
        }));
        assert_eq!(timeout.status_code(), 504);
        assert!(timeout.is_retryable());

        let unavailable = AppError::new(AppErrorKind::External(
            ExternalError::ProviderUnavailable {
                provider: "stripe".to_string(),
            },
        ));
        assert_eq!(unavailable.status_code(), 503);
        assert_eq!(unavailable.error_code(), ErrorCode::ProviderUnavailable);
    }

    #[test]
    fn test_auth_error_status_mapping() {
        let missing = AppError::new(AppErrorKind::Auth(AuthError::MissingCredentials));
        assert_eq!(missing.status_code(), 401);
        assert_eq!(missing.error_code(), ErrorCode::AuthRequired);

        let forbidden = AppError::new(AppErrorKind::Auth(AuthError::InsufficientPermissions));
        assert_eq!(forbidden.status_code(), 403);
    }

    #[test]
    fn test_validation_error() {
        let error = AppError::validation("amount must be greater than zero", Some("amount"));
        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(error.user_message().contains("amount"));
        assert!(!error.is_retryable());
    }
}
