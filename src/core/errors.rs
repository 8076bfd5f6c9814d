//! Error types for the studio backend.

use thiserror::Error;

/// Studio error type.
#[derive(Debug, Error)]
pub enum StudioError {
    /// A required text input was empty or otherwise unusable.
    #[error("{0}")]
    Validation(String),
    /// A referenced resource does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of resource that was looked up.
        resource: &'static str,
        /// Identifier that was requested.
        id: String,
    },
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// `SQLite` storage error (sync).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// `SQLite` storage error (async).
    #[error("tokio-rusqlite error: {0}")]
    TokioSqlite(#[from] tokio_rusqlite::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    /// Build a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a not-found error for `resource` identified by `id`.
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// True for errors caused by the caller rather than the backend.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound { .. })
    }
}

/// Convenience result alias for studio operations.
pub type StudioResult<T> = Result<T, StudioError>;
