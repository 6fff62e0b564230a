use models::Setting;
use sqlx::{Row, SqlitePool};

use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct SettingRepo {
    pool: SqlitePool,
}

impl SettingRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Setting>> {
        let row = sqlx::query("SELECT * FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        let Some(row) = row else { return Ok(None) };
        let value_text: String = row.try_get("value").map_err(StoreError::Fatal)?;
        let updated_at: String = row.try_get("updated_at").map_err(StoreError::Fatal)?;
        Ok(Some(Setting {
            key: row.try_get("key").map_err(StoreError::Fatal)?,
            value: serde_json::from_str(&value_text).unwrap_or(serde_json::Value::Null),
            updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                .map(|d| d.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
        }))
    }

    pub async fn set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let text = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(text)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Fatal)?;
        Ok(())
    }
}
