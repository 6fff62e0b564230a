use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallTrackerError {
    #[error("no channel found for call")]
    ChannelNotFound,
    #[error("pbx-mi is not authenticated")]
    Unavailable,
    #[error("pbx rejected the originate request")]
    OriginateRejected,
    #[error(transparent)]
    PbxMi(#[from] pbx_mi::PbxMiError),
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

pub type Result<T> = std::result::Result<T, CallTrackerError>;
