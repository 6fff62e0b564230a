use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no healthy provider available for {0}")]
    NoProvider(String),
    #[error("message rejected by compliance policy: {0}")]
    ComplianceRejected(String),
    #[error(transparent)]
    Provider(#[from] provider_registry::ProviderError),
}

pub type Result<T> = std::result::Result<T, RouterError>;
