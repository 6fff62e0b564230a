use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use models::{ProviderCapabilities, ProviderHealth};

use crate::error::{ProviderError, Result};
use crate::provider::{Provider, SendOptions, SendOutcome};

/// A deterministic stub backend for exercising the registry and router in
/// tests without a live WhatsApp/SMS/VoIP account. Not a real wrapper —
/// just enough to stand in for `Provider` (§9: "a couple of lightweight
/// stub/mock providers are enough to exercise the registry and router").
pub struct MockProvider {
    id: String,
    provider_type: String,
    capabilities: ProviderCapabilities,
    fail_sends: bool,
    healthy: Mutex<bool>,
    sent: AtomicU64,
}

impl MockProvider {
    pub fn new(id: impl Into<String>, provider_type: impl Into<String>, capabilities: ProviderCapabilities) -> Self {
        Self {
            id: id.into(),
            provider_type: provider_type.into(),
            capabilities,
            fail_sends: false,
            healthy: Mutex::new(true),
            sent: AtomicU64::new(0),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn set_healthy(&self, healthy: bool) {
        *self.healthy.lock().expect("mock provider lock") = healthy;
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, _to: &str, _text: &str, _opts: &SendOptions) -> Result<SendOutcome> {
        if self.fail_sends {
            return Err(ProviderError::Unavailable(format!("{} is simulated down", self.id)));
        }
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SendOutcome {
            message_id: format!("{}-msg-{n}", self.id),
        })
    }

    async fn get_status(&self) -> Result<ProviderHealth> {
        let healthy = *self.healthy.lock().expect("mock provider lock");
        Ok(ProviderHealth {
            healthy,
            ..ProviderHealth::default()
        })
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::ProviderCapability;

    #[tokio::test]
    async fn send_increments_counter() {
        let p = MockProvider::new("p1", "mock", ProviderCapabilities::none().with(ProviderCapability::SendText));
        p.send_message("+33611", "hi", &SendOptions::default()).await.unwrap();
        p.send_message("+33611", "hi2", &SendOptions::default()).await.unwrap();
        assert_eq!(p.sent_count(), 2);
    }

    #[tokio::test]
    async fn failing_provider_errors() {
        let p = MockProvider::new("p2", "mock", ProviderCapabilities::none()).failing();
        let err = p.send_message("+33611", "hi", &SendOptions::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }
}
