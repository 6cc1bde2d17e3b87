use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("redis connection error: {0}")]
    Connection(String),

    #[error("redis command error: {0}")]
    Command(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),
}

impl From<CacheError> for crate::error::AppError {
    fn from(err: CacheError) -> Self {
        use crate::error::{AppError, AppErrorKind, InfrastructureError};

        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Cache {
            message: err.to_string(),
        }))
    }
}
