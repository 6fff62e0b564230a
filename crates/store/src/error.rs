use thiserror::Error;

/// Error kinds per §7 of the spec, restricted to the subset the store can
/// itself produce.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("fatal store error: {0}")]
    Fatal(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Classifies a raw sqlx error as `conflict` (unique violation) or bubbles
/// it up as `fatal`, per §4.1's failure modes.
pub fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(db_err.message().to_string());
        }
    }
    StoreError::Fatal(err)
}
