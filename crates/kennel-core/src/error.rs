use thiserror::Error;

/// Failure reported by a persistence collaborator (notification store or
/// principal directory).
///
/// These are infrastructure faults, not domain outcomes. Handlers log them
/// and answer with a generic failure response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
