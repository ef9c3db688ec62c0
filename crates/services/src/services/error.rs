use db::validation::ValidationError;
use thiserror::Error;

/// Outcome of a rejected service call. Each variant maps onto one HTTP status.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound("resource not found".to_string());
        }
        if db::is_unique_violation(&error) {
            return Self::Conflict(match db::violated_constraint(&error) {
                Some(constraint) => format!("duplicate value violates {constraint}"),
                None => "resource already exists".to_string(),
            });
        }
        if db::is_foreign_key_violation(&error) {
            return Self::BadRequest("referenced resource does not exist".to_string());
        }
        Self::Database(error)
    }
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

impl db::Retryable for ServiceError {
    fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Database(e) if db::is_retryable_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_row_is_not_found() {
        assert!(matches!(
            ServiceError::from(sqlx::Error::RowNotFound),
            ServiceError::NotFound(_)
        ));
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let err = ServiceError::from(ValidationError::WeakPassword);
        assert!(matches!(err, ServiceError::BadRequest(ref m) if m.contains("at least 8")));
    }

    #[test]
    fn other_driver_errors_stay_database_errors() {
        assert!(matches!(
            ServiceError::from(sqlx::Error::PoolTimedOut),
            ServiceError::Database(_)
        ));
    }
}
