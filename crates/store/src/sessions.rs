use models::Session;
use sqlx::{Row, SqlitePool};

use crate::error::{classify, Result, StoreError};

#[derive(Clone)]
pub struct SessionRepo {
    pool: SqlitePool,
}

impl SessionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, token: &str, user_id: i64, expires_at: i64) -> Result<Session> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(Session {
            token: token.to_string(),
            user_id,
            expires_at,
        })
    }

    /// Looks up a session, returning `None` if missing or past `now`. Does
    /// not delete expired rows itself — that is `prune_expired`'s job so
    /// lookups stay read-only.
    pub async fn get_valid(&self, token: &str, now: i64) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        let Some(row) = row else { return Ok(None) };
        let expires_at: i64 = row.try_get("expires_at").map_err(StoreError::Fatal)?;
        if expires_at <= now {
            return Ok(None);
        }
        Ok(Some(Session {
            token: row.try_get("token").map_err(StoreError::Fatal)?,
            user_id: row.try_get("user_id").map_err(StoreError::Fatal)?,
            expires_at,
        }))
    }

    pub async fn delete(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(())
    }

    pub async fn prune_expired(&self, now: i64) -> Result<u64> {
        let res = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(res.rows_affected())
    }
}
