use thiserror::Error;

#[derive(Debug, Error)]
pub enum PbxMiError {
    #[error("pbx-mi is not authenticated")]
    Unavailable,
    #[error("action timed out")]
    Timeout,
    #[error("disconnected before response arrived")]
    Disconnected,
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PbxMiError>;
