use thiserror::Error;

/// Errors raised by the persistence layer. Kept separate from `MemohError` so
/// callers can map `RowNotFound` / unique-violation cases onto the right
/// `ErrorKind` without every repository function depending on `memoh-core`'s
/// error module.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Classifies a raw `sqlx::Error` returned by an INSERT/UPDATE into
    /// `Conflict` when it is a unique-violation, otherwise wraps it as-is.
    /// Repositories call this instead of the bare `#[from]` conversion
    /// whenever the statement can hit one of our partial unique indexes.
    pub fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return DbError::Conflict(db_err.message().to_string());
            }
        }
        DbError::Query(err)
    }
}

impl From<DbError> for memoh_core::MemohError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => memoh_core::MemohError::NotFound(msg),
            DbError::Conflict(msg) => memoh_core::MemohError::Conflict(msg),
            DbError::Query(sqlx::Error::RowNotFound) => {
                memoh_core::MemohError::NotFound("row not found".into())
            }
            DbError::Query(e) => memoh_core::MemohError::Internal(e.to_string()),
            DbError::Migrate(e) => memoh_core::MemohError::Internal(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
