use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for every engine operation. `NotFound`,
/// `ConstraintViolation` and `InvalidOperation` are expected, user-facing
/// outcomes; the remaining variants are storage-level failures surfaced
/// unretried.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("storage failure: {0}")]
    Storage(rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot codec error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("database lock poisoned")]
    Lock,
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            // Unique-index collisions (sku, invoice_number) and FK failures
            // are expected outcomes, not storage faults.
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::ConstraintViolation(
                    msg.clone().unwrap_or_else(|| e.to_string()),
                )
            }
            _ => Error::Storage(err),
        }
    }
}
