//! Error types for the storage layer and the caller-facing services.

use pawprint_core::{IdError, TokenError};

/// Errors from document, cache, counter, and search backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed id supplied to a by-id operation. Raised before any store access.
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] IdError),
    /// Point read matched nothing.
    #[error("record not found")]
    NotFound,
    /// Insert collided with an existing `_id`.
    #[error("duplicate key: {id}")]
    DuplicateKey { id: String },
    #[error(transparent)]
    InvalidToken(#[from] TokenError),
    /// Work was abandoned because its context was cancelled.
    #[error("operation cancelled")]
    Cancelled,
    /// Any underlying I/O or decode failure.
    #[error("store failure: {0}")]
    Backend(#[source] anyhow::Error),
}

impl StoreError {
    /// Wraps an arbitrary backend error.
    pub fn backend<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Backend(err.into())
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Stable, caller-facing error kinds returned by the services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid object id")]
    InvalidIdentity,
    #[error("not found")]
    NotFound,
    #[error("invalid pagination token: {0}")]
    InvalidToken(TokenError),
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("operation cancelled")]
    Cancelled,
    /// Primary data path failure, surfaced unmodified.
    #[error("database error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidIdentity(_) => Self::InvalidIdentity,
            StoreError::NotFound => Self::NotFound,
            StoreError::InvalidToken(e) => Self::InvalidToken(e),
            StoreError::Cancelled => Self::Cancelled,
            other @ (StoreError::DuplicateKey { .. } | StoreError::Backend(_)) => {
                Self::Store(other)
            }
        }
    }
}
