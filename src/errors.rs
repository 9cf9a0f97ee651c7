use sea_orm::error::DbErr;
use sea_orm::{SqlErr, TransactionError};
use serde::Serialize;

/// Error taxonomy shared by every service in the crate.
///
/// Expected outcomes such as an unknown barcode or an absent row are *not*
/// errors; they are variants of the operation's outcome enum. Everything here
/// aborts the operation and leaves the store at its last committed state.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    /// Store read/write failure. Any open transaction has been rolled back.
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    /// The catalog source failed or did not answer in time.
    #[error("Catalog lookup failed: {0}")]
    LookupFault(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Whether repeating the same request may succeed without any change on the caller's side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LookupFault(_))
    }

    /// Whether the failure came from the durable store.
    pub fn is_persistence_fault(&self) -> bool {
        matches!(self, Self::DatabaseError(_))
    }

    /// Whether the store rejected a write because the key is already taken.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::DatabaseError(err) => {
                matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
            }
            _ => false,
        }
    }

    /// Short message suitable for showing to the person at the scanner.
    pub fn user_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Could not save the change; nothing was modified".to_string(),
            Self::LookupFault(_) => "Product lookup failed; scan again to retry".to_string(),
            Self::InternalError(_) | Self::EventError(_) | Self::Other(_) => {
                "Internal error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_lookup_faults_are_retryable() {
        assert!(ServiceError::LookupFault("timeout".into()).is_retryable());
        assert!(!ServiceError::ValidationError("empty".into()).is_retryable());
        assert!(!ServiceError::db_error("disk full").is_retryable());
    }

    #[test]
    fn transaction_errors_unwrap_to_service_errors() {
        let err: ServiceError =
            TransactionError::Transaction(ServiceError::NotFound("x".into())).into();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err: ServiceError =
            TransactionError::<ServiceError>::Connection(DbErr::Custom("gone".into())).into();
        assert!(err.is_persistence_fault());
    }

    #[test]
    fn custom_db_errors_are_not_unique_violations() {
        let custom = ServiceError::db_error("UNIQUE constraint failed: items.barcode");
        assert!(!custom.is_unique_violation());
        assert!(!ServiceError::ValidationError("duplicate".into()).is_unique_violation());
    }

    #[test]
    fn persistence_faults_hide_driver_details() {
        let err = ServiceError::db_error("UNIQUE constraint failed: items.barcode");
        assert!(!err.user_message().contains("UNIQUE"));
    }
}
