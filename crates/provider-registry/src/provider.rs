use async_trait::async_trait;
use models::{ProviderCapabilities, ProviderHealth};

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub from: Option<String>,
    pub media_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message_id: String,
}

/// C6's polymorphic backend contract. A handful of methods are optional —
/// not every backend can report a balance or replay history — so they
/// default to a no-op rather than forcing every implementor to stub them
/// out by hand, per §4.6/§9 ("dynamic dispatch over provider kinds").
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &str;
    fn provider_type(&self) -> &str;
    fn capabilities(&self) -> ProviderCapabilities;

    async fn initialize(&self) -> Result<()>;
    async fn send_message(&self, to: &str, text: &str, opts: &SendOptions) -> Result<SendOutcome>;
    async fn get_status(&self) -> Result<ProviderHealth>;
    async fn disconnect(&self) -> Result<()>;

    async fn get_balance(&self) -> Result<Option<f64>> {
        Ok(None)
    }
    async fn get_history(&self, _chat_id: &str, _limit: u32) -> Result<Vec<serde_json::Value>> {
        Ok(Vec::new())
    }
    async fn get_delivery_status(&self, _message_id: &str) -> Result<Option<String>> {
        Ok(None)
    }
    async fn handle_webhook(&self, _payload: serde_json::Value) -> Result<()> {
        Ok(())
    }
}
