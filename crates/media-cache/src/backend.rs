use async_trait::async_trait;

use crate::error::Result;

/// The narrow contract `media-cache` needs from whichever backend actually
/// owns the media (a WhatsApp/SMS provider's media endpoint). Providers
/// implement this alongside `provider-registry::Provider` when they expose
/// downloadable media; the cache itself is backend-agnostic.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn fetch_signed_url(&self, media_id: &str) -> Result<String>;
}
