use thiserror::Error;

/// Classified database failure.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

#[derive(Debug, Error)]
pub enum DatabaseErrorKind {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("optimistic write conflict on {entity}")]
    WriteConflict { entity: String },

    #[error("connection error: {message}")]
    Connection { message: String },

    #[error("database error: {message}")]
    Unknown { message: String },
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.to_string(),
            id: id.into(),
        })
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    DatabaseErrorKind::UniqueViolation {
                        constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    }
                } else {
                    DatabaseErrorKind::Unknown {
                        message: db_err.to_string(),
                    }
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseErrorKind::Connection {
                    message: err.to_string(),
                }
            }
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self::new(kind)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::Connection { .. } | DatabaseErrorKind::WriteConflict { .. }
        )
    }
}

impl From<DatabaseError> for crate::error::AppError {
    fn from(err: DatabaseError) -> Self {
        use crate::error::{AppError, AppErrorKind, InfrastructureError};

        let retryable = err.is_retryable();
        AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Database {
                message: err.to_string(),
                is_retryable: retryable,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_are_retryable() {
        let err = DatabaseError::new(DatabaseErrorKind::Connection {
            message: "refused".to_string(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_is_not_retryable() {
        let err = DatabaseError::not_found("Payment", "pay_x");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("pay_x"));
    }
}
