//! Application error types.

use domain::{DomainError, ErrorKind};
use thiserror::Error;

/// Errors that stop the service from starting or finishing a run.
#[derive(Debug, Error)]
pub enum AppError {
    /// The connection pool could not be created.
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A table operation failed.
    #[error("{step}: {source}")]
    Domain {
        step: &'static str,
        #[source]
        source: DomainError,
    },
}

impl AppError {
    pub fn domain(step: &'static str, source: DomainError) -> Self {
        AppError::Domain { step, source }
    }

    /// The domain error kind, or `Unknown` for infrastructure failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Domain { source, .. } => source.kind(),
            AppError::Database(_) | AppError::Migration(_) => ErrorKind::Unknown,
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::NotFound => 3,
            ErrorKind::Invalid => 4,
            ErrorKind::Canceled => 130,
            ErrorKind::Unknown => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Canceled;

    #[test]
    fn domain_kind_is_forwarded() {
        let err = AppError::domain("closing table", DomainError::invalid("orders in progress"));
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.to_string(), "closing table: orders in progress");
    }

    #[test]
    fn cancellation_has_its_own_exit_code() {
        let err = AppError::domain("opening table", Canceled::ByCaller.into());
        assert_eq!(err.kind(), ErrorKind::Canceled);
        assert_eq!(err.exit_code(), 130);
    }

    #[test]
    fn infrastructure_failures_are_unknown() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.exit_code(), 1);
    }
}
