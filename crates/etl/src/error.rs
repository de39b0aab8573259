//! Engine error types.

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

/// Error kinds surfaced by the sync engine.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Unknown table, disabled table, or a mode the table does not support.
    /// Surfaced to the caller without retry.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Pool acquisition or query transport failure. Retried with bounded
    /// attempts before escalating to a sync-level failure.
    #[error("connectivity error: {0}")]
    Connectivity(#[source] sqlx::Error),

    /// A query exceeded its time budget. Fails the current batch only.
    #[error("query timed out after {0:?}")]
    QueryTimeout(Duration),

    /// Constraint violation other than a unique conflict. Fails the current
    /// batch; the sync continues with the next one.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// An analytics row failed its own invariants; the engine refuses to
    /// write it.
    #[error("analytics invariant violated: {0}")]
    Invariant(String),
}

impl EtlError {
    /// True when the error should fail only the batch it occurred in.
    pub fn is_batch_scoped(&self) -> bool {
        matches!(self, EtlError::Integrity(_) | EtlError::QueryTimeout(_))
    }
}

impl From<sqlx::Error> for EtlError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let is_integrity = db_err
                    .code()
                    .map(|code| code.starts_with("23"))
                    .unwrap_or(false);
                if is_integrity {
                    EtlError::Integrity(db_err.to_string())
                } else {
                    EtlError::Connectivity(err)
                }
            }
            _ => EtlError::Connectivity(err),
        }
    }
}

/// True when a database error is a unique-constraint violation (23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| code.as_ref() == "23505")
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = EtlError::Configuration("unknown table 'foo'".into());
        assert_eq!(err.to_string(), "configuration error: unknown table 'foo'");
    }

    #[test]
    fn test_batch_scoped_kinds() {
        assert!(EtlError::Integrity("fk".into()).is_batch_scoped());
        assert!(EtlError::QueryTimeout(Duration::from_secs(60)).is_batch_scoped());
        assert!(!EtlError::Configuration("x".into()).is_batch_scoped());
        assert!(!EtlError::Invariant("x".into()).is_batch_scoped());
    }

    #[test]
    fn test_from_transport_error_is_connectivity() {
        let err: EtlError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, EtlError::Connectivity(_)));
    }

    #[test]
    fn test_is_unique_violation_non_database() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
