use sea_orm::DbErr;
use std::fmt;

/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use apiserver_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "worker",
///     id: "abcd".to_string(),
/// };
/// assert!(err.to_string().contains("abcd"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The database could not be reached. Fatal at startup.
    #[error("Storage: cannot connect to database: {0}")]
    Connection(#[source] DbErr),

    /// No live record matches the key.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The key is already taken by a live or soft-deleted record.
    #[error("Storage: {entity} '{id}' already exists")]
    Conflict { entity: &'static str, id: String },

    /// An update tried to change the immutable username.
    #[error("Storage: username of worker '{key}' cannot be changed to '{submitted}'")]
    UsernameChanged { key: String, submitted: String },

    #[error("Storage: username must be provided")]
    BlankUsername,

    /// A write transaction failed; carries the rollback outcome as well.
    #[error("Storage: {0}")]
    Transaction(#[from] TransactionFailure),

    #[error("Storage: database error: {0}")]
    Database(#[from] DbErr),
}

/// A failed write transaction.
///
/// `source` is the error that aborted the transaction. `rollback` is set when
/// the rollback issued afterwards failed too, so neither cause is lost.
#[derive(Debug)]
pub struct TransactionFailure {
    pub operation: &'static str,
    pub source: DbErr,
    pub rollback: Option<DbErr>,
}

impl fmt::Display for TransactionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.source)?;
        if let Some(rollback) = &self.rollback {
            write!(f, "; rollback also failed: {rollback}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TransactionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_failure_reports_both_causes() {
        let failure = TransactionFailure {
            operation: "insert worker",
            source: DbErr::Custom("duplicate key".into()),
            rollback: Some(DbErr::Custom("connection reset".into())),
        };
        let msg = StorageError::from(failure).to_string();
        assert!(msg.contains("insert worker failed"));
        assert!(msg.contains("duplicate key"));
        assert!(msg.contains("rollback also failed"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn transaction_failure_without_rollback_error() {
        let failure = TransactionFailure {
            operation: "delete worker",
            source: DbErr::Custom("boom".into()),
            rollback: None,
        };
        let msg = failure.to_string();
        assert!(msg.starts_with("delete worker failed: "));
        assert!(msg.contains("boom"));
        assert!(!msg.contains("rollback"));
    }
}
