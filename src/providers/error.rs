use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("{provider} request timed out after {timeout_secs}s")]
    Timeout { provider: String, timeout_secs: u64 },

    #[error("{provider} is unavailable: {message}")]
    Unavailable { provider: String, message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    Remote {
        provider: String,
        message: String,
        provider_code: Option<String>,
    },

    #[error("Callback verification failed: {message}")]
    Verification { message: String },
}

impl ProviderError {
    pub fn missing_credentials(provider: &str) -> Self {
        ProviderError::Unavailable {
            provider: provider.to_string(),
            message: "credentials are not configured".to_string(),
        }
    }

    /// Whether the queue should retry the job that hit this error. Remote
    /// failures and timeouts are transient by contract; validation and
    /// verification failures never heal on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Validation { .. } => false,
            ProviderError::Timeout { .. } => true,
            ProviderError::Unavailable { .. } => true,
            ProviderError::Remote { .. } => true,
            ProviderError::Verification { .. } => false,
        }
    }
}

impl From<ProviderError> for crate::error::AppError {
    fn from(err: ProviderError) -> Self {
        use crate::error::{AppError, AppErrorKind, ExternalError};

        match err {
            ProviderError::Validation { message, field } => {
                AppError::validation(message, field.as_deref())
            }
            ProviderError::Verification { message } => {
                AppError::validation(message, Some("signature"))
            }
            ProviderError::Timeout {
                provider,
                timeout_secs,
            } => AppError::new(AppErrorKind::External(ExternalError::ProviderTimeout {
                provider,
                timeout_secs,
            })),
            ProviderError::Unavailable { provider, .. } => AppError::new(AppErrorKind::External(
                ExternalError::ProviderUnavailable { provider },
            )),
            ProviderError::Remote {
                provider, message, ..
            } => AppError::new(AppErrorKind::External(ExternalError::Provider {
                provider,
                message,
                is_retryable: true,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags() {
        assert!(ProviderError::Timeout {
            provider: "moncash".to_string(),
            timeout_secs: 30
        }
        .is_retryable());
        assert!(ProviderError::missing_credentials("stripe").is_retryable());
        assert!(!ProviderError::Verification {
            message: "bad signature".to_string()
        }
        .is_retryable());
        assert!(!ProviderError::Validation {
            message: "bad amount".to_string(),
            field: None
        }
        .is_retryable());
    }

    #[test]
    fn error_codes_map_to_http_statuses() {
        use crate::error::AppError;

        let timeout: AppError = ProviderError::Timeout {
            provider: "natcash".to_string(),
            timeout_secs: 30,
        }
        .into();
        assert_eq!(timeout.status_code(), 504);

        let unavailable: AppError = ProviderError::missing_credentials("moncash").into();
        assert_eq!(unavailable.status_code(), 503);

        let remote: AppError = ProviderError::Remote {
            provider: "stripe".to_string(),
            message: "boom".to_string(),
            provider_code: None,
        }
        .into();
        assert_eq!(remote.status_code(), 502);
    }
}
