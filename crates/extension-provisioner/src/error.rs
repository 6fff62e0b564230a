use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("extension {0} not found")]
    NotFound(String),
    #[error(transparent)]
    PbxMi(#[from] pbx_mi::PbxMiError),
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

pub type Result<T> = std::result::Result<T, ProvisionerError>;
