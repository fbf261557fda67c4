use domain::DomainError;
use sqlx::error::ErrorKind as DbErrorKind;

/// Translates a driver error into the domain taxonomy.
///
/// `RowNotFound` becomes `NotFound`, constraint violations become
/// `Invalid`, anything else is kept as a storage failure with `context`
/// naming the entity that was being read or written.
pub(crate) fn classify(err: sqlx::Error, context: impl Into<String>) -> DomainError {
    let context = context.into();

    match err {
        sqlx::Error::RowNotFound => DomainError::not_found(format!("{context}: not found")),
        sqlx::Error::Database(ref db) => match db.kind() {
            DbErrorKind::ForeignKeyViolation
            | DbErrorKind::CheckViolation
            | DbErrorKind::NotNullViolation => {
                DomainError::invalid(format!("{context}: {}", db.message()))
            }
            _ => DomainError::storage(context, err),
        },
        other => DomainError::storage(context, other),
    }
}

/// Extension for attaching entity context to driver results.
pub(crate) trait SqlxResultExt<T> {
    fn classify(self, context: impl FnOnce() -> String) -> Result<T, DomainError>;
}

impl<T> SqlxResultExt<T> for Result<T, sqlx::Error> {
    fn classify(self, context: impl FnOnce() -> String) -> Result<T, DomainError> {
        self.map_err(|err| classify(err, context()))
    }
}
