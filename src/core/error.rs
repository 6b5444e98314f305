//! Typed core errors. Only the kinds that are allowed to surface to a
//! caller get a variant here — `IndexUnavailable`, `ChunkingFailure`,
//! `VectorFitFailure`, and `BudgetExceeded` are recovered locally (logged via
//! `tracing::warn!` and degraded) and never constructed as a `CoreError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    StorageFailure(#[from] rusqlite::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
