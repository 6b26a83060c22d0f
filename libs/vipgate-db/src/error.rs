use thiserror::Error;

/// Failures surfaced by the subscription ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed payment report submission
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown id, or a report that is no longer pending
    #[error("Not found: {0}")]
    NotFound(String),

    /// Activation window that no calendar can represent
    #[error("Activation window of {0} days is out of range")]
    WindowOutOfRange(i64),

    /// Storage backend failed; nothing was written
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
