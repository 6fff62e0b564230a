use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use dto::PushEvent;
use models::{Chat, Message, MessageStatus, MessageType, ProviderKind};
use push_bus::PushFanout;
use store::Store;
use tokio::sync::Mutex;

use crate::config::ReflectorConfig;
use crate::error::{ReflectorError, Result};
use crate::source::ReflectorSource;

struct PollState {
    backoff_ms: u64,
    seen_chats: HashSet<String>,
    last_error: Option<String>,
    repeat_count: u32,
}

/// C8: polls one remote conversation store and mirrors it into the local
/// `Store`, with exponential backoff on failure and idempotent ingest.
pub struct ChatReflector {
    source: Arc<dyn ReflectorSource>,
    store: Store,
    push: Arc<PushFanout>,
    recipients: Vec<i64>,
    config: ReflectorConfig,
    state: Mutex<PollState>,
    remote_numbers: DashMap<String, String>,
}

impl ChatReflector {
    pub fn new(
        source: Arc<dyn ReflectorSource>,
        store: Store,
        push: Arc<PushFanout>,
        recipients: Vec<i64>,
        config: ReflectorConfig,
    ) -> Self {
        let backoff_ms = config.sync_interval_ms;
        Self {
            source,
            store,
            push,
            recipients,
            config,
            state: Mutex::new(PollState {
                backoff_ms,
                seen_chats: HashSet::new(),
                last_error: None,
                repeat_count: 0,
            }),
            remote_numbers: DashMap::new(),
        }
    }

    /// Runs the sleep-then-poll loop forever. Intended to be spawned as its
    /// own task per reflected provider instance (§5).
    pub async fn run_loop(self: Arc<Self>) {
        loop {
            let sleep_ms = self.state.lock().await.backoff_ms;
            tokio::time::sleep(std::time::Duration::from_millis(sleep_ms)).await;
            if let Err(err) = self.poll_once().await {
                self.on_poll_failure(&err).await;
            } else {
                self.on_poll_success().await;
            }
        }
    }

    async fn on_poll_success(&self) {
        let mut state = self.state.lock().await;
        if state.last_error.is_some() {
            tracing::info!(provider_id = %self.source.provider_id(), "reflector poll recovered");
        }
        state.backoff_ms = self.config.sync_interval_ms;
        state.last_error = None;
        state.repeat_count = 0;
    }

    async fn on_poll_failure(&self, err: &ReflectorError) {
        let mut state = self.state.lock().await;
        let text = err.to_string();
        let is_repeat = state.last_error.as_deref() == Some(text.as_str());
        if is_repeat {
            state.repeat_count += 1;
        } else {
            state.repeat_count = 1;
        }
        if state.repeat_count <= self.config.max_repeat_logs {
            tracing::warn!(provider_id = %self.source.provider_id(), error = %text, "reflector poll failed");
        }
        state.last_error = Some(text);
        state.backoff_ms = (state.backoff_ms * 2).min(self.config.max_sync_interval_ms);
    }

    /// One fetch-and-ingest cycle. Returns the number of `new_message`
    /// events emitted, for tests asserting scenario-level idempotence.
    pub async fn poll_once(&self) -> Result<usize> {
        let conversations = self.source.list_conversations().await?;
        let mut new_messages = 0usize;

        for conversation in conversations {
            let chat_id = format!("{}_{}", self.source.chat_id_prefix(), conversation.id);
            self.remote_numbers.insert(chat_id.clone(), conversation.remote_number.clone());

            let first_boot = {
                let state = self.state.lock().await;
                !state.seen_chats.contains(&chat_id)
            };
            let limit = if self.config.full_history_on_first_boot && first_boot {
                self.config.first_boot_limit
            } else {
                self.config.recent_window
            };

            let remote_messages = self.source.list_messages(&conversation.id, limit).await?;
            let mut batch_max_ts = 0i64;

            for remote in &remote_messages {
                batch_max_ts = batch_max_ts.max(remote.timestamp);
                let message = Message {
                    id: remote.id.clone(),
                    chat_id: chat_id.clone(),
                    from_me: remote.from_me,
                    message_type: MessageType::Text,
                    content: remote.content.clone(),
                    sender_id: remote.sender_id.clone(),
                    timestamp: remote.timestamp,
                    status: if remote.from_me { MessageStatus::Sent } else { MessageStatus::Received },
                    media_url: None,
                    raw_payload: None,
                };
                let is_new = self.store.messages.ingest(&message).await?;
                if is_new {
                    new_messages += 1;
                    self.push
                        .publish(
                            &self.store,
                            &self.recipients,
                            PushEvent::NewMessage {
                                chat_id: chat_id.clone(),
                                message_id: message.id.clone(),
                                from_me: message.from_me,
                                preview: preview_of(&message.content),
                                timestamp: message.timestamp,
                            },
                        )
                        .await;
                }
            }

            self.store
                .chats
                .upsert(&Chat {
                    id: chat_id.clone(),
                    display_name: conversation.display_name.clone(),
                    provider: ProviderKind::Sms,
                    unread_count: 0,
                    timestamp: batch_max_ts,
                    line_id: None,
                    metadata: serde_json::json!({}),
                })
                .await?;

            self.state.lock().await.seen_chats.insert(chat_id);
        }

        Ok(new_messages)
    }

    /// Sends a message through the remote source, then stores it locally
    /// and emits `new_message` immediately so the next poll's echo of the
    /// same id is a no-op (§4.8 "outbound via reflector").
    pub async fn send_text(&self, chat_id: &str, text: &str) -> Result<Message> {
        let remote_number = self
            .remote_numbers
            .get(chat_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ReflectorError::ChatNotFound(chat_id.to_string()))?;

        let sent = self.source.send_text(&remote_number, text).await?;

        let message = Message {
            id: sent.id,
            chat_id: chat_id.to_string(),
            from_me: true,
            message_type: MessageType::Text,
            content: text.to_string(),
            sender_id: sent.sender_id,
            timestamp: sent.timestamp,
            status: MessageStatus::Sent,
            media_url: None,
            raw_payload: None,
        };
        self.store.messages.ingest(&message).await?;
        if let Some(mut chat) = self.store.chats.get(chat_id).await? {
            chat.timestamp = message.timestamp;
            self.store.chats.upsert(&chat).await?;
        }

        self.push
            .publish(
                &self.store,
                &self.recipients,
                PushEvent::NewMessage {
                    chat_id: message.chat_id.clone(),
                    message_id: message.id.clone(),
                    from_me: true,
                    preview: preview_of(&message.content),
                    timestamp: message.timestamp,
                },
            )
            .await;

        Ok(message)
    }
}

fn preview_of(content: &str) -> String {
    const MAX: usize = 80;
    if content.chars().count() <= MAX {
        content.to_string()
    } else {
        content.chars().take(MAX).collect::<String>() + "…"
    }
}
