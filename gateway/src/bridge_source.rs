//! A generic HTTP `ReflectorSource` for polling-only bridges (the SMS
//! bridge is the typifying case in §4.8). Not a full third-party wrapper —
//! just the thin `list_conversations`/`list_messages`/`send_text` contract
//! C8 needs, grounded in `reqwest`, the pack's standard HTTP client.

use async_trait::async_trait;
use chat_reflector::{RemoteConversation, RemoteMessage, ReflectorError, ReflectorSource, Result};
use serde::Deserialize;

pub struct HttpBridgeSource {
    provider_id: String,
    chat_id_prefix: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpBridgeSource {
    pub fn new(provider_id: impl Into<String>, chat_id_prefix: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            chat_id_prefix: chat_id_prefix.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Deserialize)]
struct ConversationsEnvelope {
    conversations: Vec<RemoteConversationDto>,
}

#[derive(Debug, Deserialize)]
struct RemoteConversationDto {
    id: String,
    display_name: String,
    remote_number: String,
}

#[derive(Debug, Deserialize)]
struct MessagesEnvelope {
    messages: Vec<RemoteMessageDto>,
}

#[derive(Debug, Deserialize)]
struct RemoteMessageDto {
    id: String,
    from_me: bool,
    content: String,
    sender_id: Option<String>,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct SendEnvelope {
    id: String,
    timestamp: i64,
}

#[async_trait]
impl ReflectorSource for HttpBridgeSource {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn chat_id_prefix(&self) -> &str {
        &self.chat_id_prefix
    }

    async fn list_conversations(&self) -> Result<Vec<RemoteConversation>> {
        let resp = self
            .client
            .get(self.url("/conversations"))
            .send()
            .await
            .map_err(|err| ReflectorError::Remote(err.to_string()))?
            .error_for_status()
            .map_err(|err| ReflectorError::Remote(err.to_string()))?
            .json::<ConversationsEnvelope>()
            .await
            .map_err(|err| ReflectorError::Remote(err.to_string()))?;

        Ok(resp
            .conversations
            .into_iter()
            .map(|c| RemoteConversation {
                id: c.id,
                display_name: c.display_name,
                remote_number: c.remote_number,
            })
            .collect())
    }

    async fn list_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<RemoteMessage>> {
        let resp = self
            .client
            .get(self.url(&format!("/conversations/{conversation_id}/messages")))
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(|err| ReflectorError::Remote(err.to_string()))?
            .error_for_status()
            .map_err(|err| ReflectorError::Remote(err.to_string()))?
            .json::<MessagesEnvelope>()
            .await
            .map_err(|err| ReflectorError::Remote(err.to_string()))?;

        Ok(resp
            .messages
            .into_iter()
            .map(|m| RemoteMessage {
                id: m.id,
                from_me: m.from_me,
                content: m.content,
                sender_id: m.sender_id,
                timestamp: m.timestamp,
            })
            .collect())
    }

    async fn send_text(&self, remote_number: &str, text: &str) -> Result<RemoteMessage> {
        let resp = self
            .client
            .post(self.url("/send"))
            .json(&serde_json::json!({"to": remote_number, "text": text}))
            .send()
            .await
            .map_err(|err| ReflectorError::Remote(err.to_string()))?
            .error_for_status()
            .map_err(|err| ReflectorError::Remote(err.to_string()))?
            .json::<SendEnvelope>()
            .await
            .map_err(|err| ReflectorError::Remote(err.to_string()))?;

        Ok(RemoteMessage {
            id: resp.id,
            from_me: true,
            content: text.to_string(),
            sender_id: None,
            timestamp: resp.timestamp,
        })
    }
}
