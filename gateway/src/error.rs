use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dto::ErrorEnvelope;

/// The §7 error kinds this binary's HTTP layer can produce, translated to
/// a status code plus `{success:false, error, details?}` envelope — the
/// single `IntoResponse` translation point, mirroring the teacher's
/// `ApiError`/`IntoResponse` pattern in `services/api`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    ChannelNotFound,
    #[error("pbx-mi is not authenticated")]
    Unavailable,
    #[error("no healthy provider available")]
    NoProvider,
    #[error("{0}")]
    BlockedByPolicy(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::ChannelNotFound => (StatusCode::NOT_FOUND, "channel-not-found".to_string()),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "unavailable".to_string()),
            ApiError::NoProvider => (StatusCode::SERVICE_UNAVAILABLE, "no-provider".to_string()),
            ApiError::BlockedByPolicy(reason) => (StatusCode::UNPROCESSABLE_ENTITY, reason.clone()),
            ApiError::Unexpected(err) => {
                tracing::error!(error = %err, "unexpected gateway error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorEnvelope::new(error))).into_response()
    }
}

impl From<call_tracker::CallTrackerError> for ApiError {
    fn from(err: call_tracker::CallTrackerError) -> Self {
        match err {
            call_tracker::CallTrackerError::ChannelNotFound => ApiError::ChannelNotFound,
            call_tracker::CallTrackerError::Unavailable => ApiError::Unavailable,
            other => ApiError::Unexpected(anyhow::anyhow!(other)),
        }
    }
}

impl From<sms_router::RouterError> for ApiError {
    fn from(err: sms_router::RouterError) -> Self {
        match err {
            sms_router::RouterError::NoProvider(_) => ApiError::NoProvider,
            other => ApiError::Unexpected(anyhow::anyhow!(other)),
        }
    }
}

impl From<extension_provisioner::ProvisionerError> for ApiError {
    fn from(err: extension_provisioner::ProvisionerError) -> Self {
        match err {
            extension_provisioner::ProvisionerError::NotFound(id) => ApiError::NotFound(id),
            other => ApiError::Unexpected(anyhow::anyhow!(other)),
        }
    }
}

impl From<store::StoreError> for ApiError {
    fn from(err: store::StoreError) -> Self {
        match err {
            store::StoreError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Unexpected(anyhow::anyhow!(other)),
        }
    }
}
