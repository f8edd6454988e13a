use crate::bundle::BundleError;
use crate::db::DbError;
use crate::env::EnvError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The YAML file or `BLOGD_*` overrides could not be merged into [`crate::Config`]
    #[error("Failed to load configuration: {0}")]
    Config(Box<figment::Error>),

    /// Required environment variables are missing or malformed
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Configuration loaded but is inconsistent
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Database pool construction or query error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Build output post-processing failed
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// Request rejected by a security policy
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::Database(db_err) => match db_err {
                DbError::Connect(_) | DbError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                DbError::InvalidUrl(_) | DbError::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Config(_)
            | Error::Env(_)
            | Error::InvalidConfig { .. }
            | Error::Bundle(_)
            | Error::Internal { .. }
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Forbidden { message } => message.clone(),
            Error::Database(DbError::Connect(_) | DbError::Unavailable(_)) => "Database unavailable".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Forbidden { .. } => {
                tracing::info!("Request rejected: {}", self);
            }
            Error::Database(DbError::Connect(_) | DbError::Unavailable(_)) => {
                tracing::warn!("Database unavailable: {:#}", self);
            }
            _ => {
                tracing::error!("Internal service error: {:#}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
