use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaCacheError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, MediaCacheError>;
