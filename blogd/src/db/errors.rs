use thiserror::Error;

/// Errors from building or using the connection pool
#[derive(Error, Debug)]
pub enum DbError {
    /// `DATABASE_URL` is not a usable PostgreSQL connection string
    #[error("invalid database url: {0}")]
    InvalidUrl(#[source] sqlx::Error),

    /// Eager pool construction could not reach the database
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// A connection could not be acquired or a health check failed
    #[error("database unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error(transparent)]
    Query(#[from] sqlx::Error),
}

impl DbError {
    /// Whether the failure is the database being unreachable rather than a programming error
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::Connect(_) | DbError::Unavailable(_))
    }
}
