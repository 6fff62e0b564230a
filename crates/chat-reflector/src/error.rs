use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReflectorError {
    #[error("remote chat not found: {0}")]
    ChatNotFound(String),
    #[error("remote fetch failed: {0}")]
    Remote(String),
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

pub type Result<T> = std::result::Result<T, ReflectorError>;
