use models::{PushToken, WebPushKeys, WebPushSubscription};
use sqlx::{Row, SqlitePool};

use crate::error::{classify, Result, StoreError};

#[derive(Clone)]
pub struct PushTokenRepo {
    pool: SqlitePool,
}

fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<PushToken, sqlx::Error> {
    let created_at: String = row.try_get("created_at")?;
    let last_used_at: String = row.try_get("last_used_at")?;
    Ok(PushToken {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        token: row.try_get("token")?,
        platform: row.try_get("platform")?,
        device_id: row.try_get("device_id")?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        last_used_at: chrono::DateTime::parse_from_rfc3339(&last_used_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}

impl PushTokenRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, user_id: i64, token: &str, platform: &str, device_id: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO push_tokens (user_id, token, platform, device_id, created_at, last_used_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(token) DO UPDATE SET last_used_at = excluded.last_used_at",
        )
        .bind(user_id)
        .bind(token)
        .bind(platform)
        .bind(device_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<PushToken>> {
        let rows = sqlx::query("SELECT * FROM push_tokens WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        rows.iter()
            .map(row_to_token)
            .collect::<std::result::Result<_, _>>()
            .map_err(StoreError::Fatal)
    }

    pub async fn remove(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM push_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(())
    }

    /// Prunes tokens unused for more than `stale_days` (§3 lifecycle note).
    pub async fn prune_stale(&self, stale_days: i64) -> Result<u64> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(stale_days);
        let res = sqlx::query("DELETE FROM push_tokens WHERE last_used_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(res.rows_affected())
    }
}

#[derive(Clone)]
pub struct WebPushSubscriptionRepo {
    pool: SqlitePool,
}

impl WebPushSubscriptionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, sub: &WebPushSubscription) -> Result<()> {
        sqlx::query(
            "INSERT INTO web_push_subscriptions (endpoint, user_id, p256dh, auth) VALUES (?, ?, ?, ?)
             ON CONFLICT(endpoint) DO UPDATE SET p256dh = excluded.p256dh, auth = excluded.auth",
        )
        .bind(&sub.endpoint)
        .bind(sub.user_id)
        .bind(&sub.keys.p256dh)
        .bind(&sub.keys.auth)
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<WebPushSubscription>> {
        let rows = sqlx::query("SELECT * FROM web_push_subscriptions WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(rows
            .into_iter()
            .map(|row| WebPushSubscription {
                endpoint: row.get("endpoint"),
                user_id: row.get("user_id"),
                keys: WebPushKeys {
                    p256dh: row.get("p256dh"),
                    auth: row.get("auth"),
                },
            })
            .collect())
    }

    /// Called when the push provider returns 404/410 for an endpoint.
    pub async fn deregister(&self, endpoint: &str) -> Result<()> {
        sqlx::query("DELETE FROM web_push_subscriptions WHERE endpoint = ?")
            .bind(endpoint)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(())
    }
}
