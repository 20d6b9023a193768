//! Unified error types for the retainer ledger.
//!
//! Business failures map onto four classes (see [`ErrorKind`]): missing records,
//! illegal state for the requested operation, uniqueness conflicts, and lock
//! contention on period close. Everything else is ambient infrastructure failure.

use thiserror::Error;

/// Classification of an [`Error`] as seen by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced agreement, period, customer or invoice does not exist.
    NotFound,
    /// The request is not valid for the current state or configuration.
    InvalidState,
    /// The request would violate a uniqueness rule.
    ResourceConflict,
    /// Another close holds the period; safe to retry.
    ConcurrencyConflict,
    /// Storage, configuration or I/O failure.
    Infrastructure,
}

/// Crate error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Resource conflict: {message}")]
    ResourceConflict { message: String },

    #[error("Concurrency conflict: {message}")]
    ConcurrencyConflict { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl Error {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Returns the taxonomy class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::ResourceConflict { .. } => ErrorKind::ResourceConflict,
            Self::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            Self::Config { .. } | Self::Database(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::ConcurrencyConflict)
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
