use models::{Message, MessageStatus, MessageType};
use sqlx::{Row, SqlitePool};

use crate::error::{classify, Result, StoreError};

#[derive(Clone)]
pub struct MessageRepo {
    pool: SqlitePool,
}

fn message_type_to_str(t: MessageType) -> &'static str {
    match t {
        MessageType::Text => "text",
        MessageType::Image => "image",
        MessageType::Audio => "audio",
        MessageType::Video => "video",
        MessageType::Document => "document",
        MessageType::Location => "location",
        MessageType::Sticker => "sticker",
    }
}

fn message_type_from_str(s: &str) -> MessageType {
    match s {
        "image" => MessageType::Image,
        "audio" => MessageType::Audio,
        "video" => MessageType::Video,
        "document" => MessageType::Document,
        "location" => MessageType::Location,
        "sticker" => MessageType::Sticker,
        _ => MessageType::Text,
    }
}

fn status_to_str(s: MessageStatus) -> &'static str {
    match s {
        MessageStatus::Pending => "pending",
        MessageStatus::Sent => "sent",
        MessageStatus::Delivered => "delivered",
        MessageStatus::Read => "read",
        MessageStatus::Failed => "failed",
        MessageStatus::Received => "received",
    }
}

fn status_from_str(s: &str) -> MessageStatus {
    match s {
        "sent" => MessageStatus::Sent,
        "delivered" => MessageStatus::Delivered,
        "read" => MessageStatus::Read,
        "failed" => MessageStatus::Failed,
        "received" => MessageStatus::Received,
        _ => MessageStatus::Pending,
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<Message, sqlx::Error> {
    let message_type: String = row.try_get("message_type")?;
    let status: String = row.try_get("status")?;
    let raw_payload: Option<String> = row.try_get("raw_payload")?;
    Ok(Message {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        from_me: row.try_get::<i64, _>("from_me")? != 0,
        message_type: message_type_from_str(&message_type),
        content: row.try_get("content")?,
        sender_id: row.try_get("sender_id")?,
        timestamp: row.try_get("timestamp")?,
        status: status_from_str(&status),
        media_url: row.try_get("media_url")?,
        raw_payload: raw_payload.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

impl MessageRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Idempotent ingest keyed by `(chat_id, id)`. Returns `true` if a new
    /// row was inserted, `false` if the message already existed (a no-op
    /// per §8 invariant 2) or if it existed and only its status advanced.
    pub async fn ingest(&self, message: &Message) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Fatal)?;

        let existing = sqlx::query("SELECT status FROM messages WHERE chat_id = ? AND id = ?")
            .bind(&message.chat_id)
            .bind(&message.id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::Fatal)?;

        let raw_payload = message
            .raw_payload
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default());

        match existing {
            None => {
                sqlx::query(
                    "INSERT INTO messages (chat_id, id, from_me, message_type, content, sender_id, timestamp, status, media_url, raw_payload)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&message.chat_id)
                .bind(&message.id)
                .bind(message.from_me as i64)
                .bind(message_type_to_str(message.message_type))
                .bind(&message.content)
                .bind(&message.sender_id)
                .bind(message.timestamp)
                .bind(status_to_str(message.status))
                .bind(&message.media_url)
                .bind(raw_payload)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
                tx.commit().await.map_err(StoreError::Fatal)?;
                Ok(true)
            }
            Some(row) => {
                let current: String = row.try_get("status").map_err(StoreError::Fatal)?;
                let current_status = status_from_str(&current);
                if current_status.may_transition_to(message.status) && current_status != message.status {
                    sqlx::query("UPDATE messages SET status = ? WHERE chat_id = ? AND id = ?")
                        .bind(status_to_str(message.status))
                        .bind(&message.chat_id)
                        .bind(&message.id)
                        .execute(&mut *tx)
                        .await
                        .map_err(StoreError::Fatal)?;
                }
                tx.commit().await.map_err(StoreError::Fatal)?;
                Ok(false)
            }
        }
    }

    pub async fn list_for_chat(&self, chat_id: &str, limit: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE chat_id = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(chat_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Fatal)?;
        rows.iter()
            .map(row_to_message)
            .collect::<std::result::Result<_, _>>()
            .map_err(StoreError::Fatal)
    }

    pub async fn max_timestamp_for_chat(&self, chat_id: &str) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT MAX(timestamp) as max_ts FROM messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        row.try_get::<Option<i64>, _>("max_ts")
            .map_err(StoreError::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::Chat;

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn sample(status: MessageStatus) -> Message {
        Message {
            id: "m1".into(),
            chat_id: "sms_7".into(),
            from_me: false,
            message_type: MessageType::Text,
            content: "hi".into(),
            sender_id: None,
            timestamp: 100,
            status,
            media_url: None,
            raw_payload: None,
        }
    }

    #[tokio::test]
    async fn ingest_is_idempotent() {
        let pool = pool().await;
        let chats = crate::chats::ChatRepo::new(pool.clone());
        chats
            .upsert(&Chat {
                id: "sms_7".into(),
                display_name: "7".into(),
                provider: models::ProviderKind::Sms,
                unread_count: 0,
                timestamp: 0,
                line_id: None,
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        let repo = MessageRepo::new(pool);
        assert!(repo.ingest(&sample(MessageStatus::Received)).await.unwrap());
        assert!(!repo.ingest(&sample(MessageStatus::Received)).await.unwrap());
        let msgs = repo.list_for_chat("sms_7", 10).await.unwrap();
        assert_eq!(msgs.len(), 1);
    }

    #[tokio::test]
    async fn status_never_regresses() {
        let pool = pool().await;
        let chats = crate::chats::ChatRepo::new(pool.clone());
        chats
            .upsert(&Chat {
                id: "sms_7".into(),
                display_name: "7".into(),
                provider: models::ProviderKind::Sms,
                unread_count: 0,
                timestamp: 0,
                line_id: None,
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        let repo = MessageRepo::new(pool);
        repo.ingest(&sample(MessageStatus::Read)).await.unwrap();
        repo.ingest(&sample(MessageStatus::Sent)).await.unwrap();
        let msgs = repo.list_for_chat("sms_7", 10).await.unwrap();
        assert_eq!(msgs[0].status, MessageStatus::Read);
    }
}
