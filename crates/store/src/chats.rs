use models::{Chat, ProviderKind};
use sqlx::{Row, SqlitePool};

use crate::error::{classify, Result, StoreError};

#[derive(Clone)]
pub struct ChatRepo {
    pool: SqlitePool,
}

fn row_to_chat(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<Chat, sqlx::Error> {
    let provider: String = row.try_get("provider")?;
    let metadata: String = row.try_get("metadata")?;
    Ok(Chat {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        provider: ProviderKind::parse(&provider).unwrap_or(ProviderKind::Sms),
        unread_count: row.try_get("unread_count")?,
        timestamp: row.try_get("timestamp")?,
        line_id: row.try_get("line_id")?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
    })
}

impl ChatRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts the chat if absent, otherwise updates display name/metadata
    /// and raises `timestamp` to `max(current, incoming)` — never lowers it,
    /// per the store invariant that `chat.timestamp` only moves forward.
    pub async fn upsert(&self, chat: &Chat) -> Result<()> {
        let metadata = serde_json::to_string(&chat.metadata).unwrap_or_else(|_| "{}".to_string());
        sqlx::query(
            "INSERT INTO chats (id, display_name, provider, unread_count, timestamp, line_id, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                provider = excluded.provider,
                unread_count = excluded.unread_count,
                timestamp = MAX(chats.timestamp, excluded.timestamp),
                line_id = excluded.line_id,
                metadata = excluded.metadata",
        )
        .bind(&chat.id)
        .bind(&chat.display_name)
        .bind(chat.provider.as_str())
        .bind(chat.unread_count)
        .bind(chat.timestamp)
        .bind(&chat.line_id)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Chat>> {
        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        row.as_ref()
            .map(row_to_chat)
            .transpose()
            .map_err(StoreError::Fatal)
    }

    pub async fn set_timestamp(&self, id: &str, timestamp: i64) -> Result<()> {
        sqlx::query("UPDATE chats SET timestamp = ? WHERE id = ?")
            .bind(timestamp)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Chat>> {
        let rows = sqlx::query("SELECT * FROM chats ORDER BY timestamp DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        rows.iter()
            .map(row_to_chat)
            .collect::<std::result::Result<_, _>>()
            .map_err(StoreError::Fatal)
    }
}
