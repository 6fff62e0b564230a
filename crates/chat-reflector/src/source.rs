use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RemoteConversation {
    pub id: String,
    pub display_name: String,
    pub remote_number: String,
}

#[derive(Debug, Clone)]
pub struct RemoteMessage {
    pub id: String,
    pub from_me: bool,
    pub content: String,
    pub sender_id: Option<String>,
    pub timestamp: i64,
}

/// The polling-only remote conversation store C8 mirrors into C1 (the SMS
/// bridge is the typifying case, per §4.8). One implementation per
/// reflected provider instance.
#[async_trait]
pub trait ReflectorSource: Send + Sync {
    fn provider_id(&self) -> &str;

    /// Prefix used to build this source's local chat ids, e.g. `"sms"` so
    /// remote conversation `7` becomes local chat `sms_7` (§8 scenario 5).
    fn chat_id_prefix(&self) -> &str {
        "sms"
    }

    async fn list_conversations(&self) -> Result<Vec<RemoteConversation>>;
    async fn list_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<RemoteMessage>>;
    async fn send_text(&self, remote_number: &str, text: &str) -> Result<RemoteMessage>;
}
