use thiserror::Error;

/// Error kinds a `Provider` implementation (or the registry itself) can
/// produce, restricted to the §7 subset relevant to this layer.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("provider {0} not found")]
    NotFound(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider request timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, ProviderError>;
