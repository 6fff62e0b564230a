use models::VoipExtension;
use sqlx::{Row, SqlitePool};

use crate::error::{classify, Result, StoreError};

#[derive(Clone)]
pub struct VoipExtensionRepo {
    pool: SqlitePool,
}

fn row_to_extension(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<VoipExtension, sqlx::Error> {
    let codec_preference: String = row.try_get("codec_preference")?;
    Ok(VoipExtension {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        extension: row.try_get("extension")?,
        secret: row.try_get("secret")?,
        display_name: row.try_get("display_name")?,
        context: row.try_get("context")?,
        transport: row.try_get("transport")?,
        codec_preference: serde_json::from_str(&codec_preference).unwrap_or_default(),
        enabled: row.try_get::<i64, _>("enabled")? != 0,
        webrtc_enabled: row.try_get::<i64, _>("webrtc_enabled")? != 0,
        synced_to_pbx: row.try_get::<i64, _>("synced_to_pbx")? != 0,
        sync_error: row.try_get("sync_error")?,
    })
}

impl VoipExtensionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Allocates and persists the next free extension number inside a single
    /// transaction, so two concurrent callers never observe or claim the
    /// same number (§8 invariant 7, scenario 6).
    pub async fn allocate_next(
        &self,
        user_id: i64,
        start_from: i64,
        display_name: &str,
        secret: &str,
        context: &str,
        transport: &str,
    ) -> Result<VoipExtension> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Fatal)?;

        let rows = sqlx::query("SELECT extension FROM voip_extensions")
            .fetch_all(&mut *tx)
            .await
            .map_err(StoreError::Fatal)?;
        let max_existing = rows
            .iter()
            .filter_map(|r| r.try_get::<String, _>("extension").ok())
            .filter_map(|s| s.parse::<i64>().ok())
            .max();
        let next = match max_existing {
            Some(max) => (max + 1).max(start_from),
            None => start_from,
        };
        let next_str = next.to_string();

        sqlx::query(
            "INSERT INTO voip_extensions (user_id, extension, secret, display_name, context, transport, codec_preference, enabled, webrtc_enabled, synced_to_pbx)
             VALUES (?, ?, ?, ?, ?, ?, '[]', 1, 0, 0)",
        )
        .bind(user_id)
        .bind(&next_str)
        .bind(secret)
        .bind(display_name)
        .bind(context)
        .bind(transport)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(StoreError::Fatal)?;

        self.get_by_extension(&next_str)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("extension {next_str}")))
    }

    pub async fn get_by_extension(&self, extension: &str) -> Result<Option<VoipExtension>> {
        let row = sqlx::query("SELECT * FROM voip_extensions WHERE extension = ?")
            .bind(extension)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        row.as_ref()
            .map(row_to_extension)
            .transpose()
            .map_err(StoreError::Fatal)
    }

    pub async fn set_sync_status(&self, extension: &str, synced: bool, error: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE voip_extensions SET synced_to_pbx = ?, sync_error = ? WHERE extension = ?")
            .bind(synced as i64)
            .bind(error)
            .bind(extension)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(())
    }

    pub async fn set_secret(&self, extension: &str, secret: &str) -> Result<()> {
        let res = sqlx::query("UPDATE voip_extensions SET secret = ? WHERE extension = ?")
            .bind(secret)
            .bind(extension)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("extension {extension}")));
        }
        Ok(())
    }

    pub async fn delete(&self, extension: &str) -> Result<()> {
        sqlx::query("DELETE FROM voip_extensions WHERE extension = ?")
            .bind(extension)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::UserRepo;

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn allocation_skips_existing_and_respects_start_from() {
        let pool = pool().await;
        let users = UserRepo::new(pool.clone());
        let repo = VoipExtensionRepo::new(pool);

        let u1 = users.create("alice", "hash", models::Role::User).await.unwrap();
        let u2 = users.create("bob", "hash", models::Role::User).await.unwrap();

        let e1 = repo
            .allocate_next(u1.id, 1000, "Alice", "secret1", "internal", "udp")
            .await
            .unwrap();
        assert_eq!(e1.extension, "1000");

        let e2 = repo
            .allocate_next(u2.id, 1000, "Bob", "secret2", "internal", "udp")
            .await
            .unwrap();
        assert_eq!(e2.extension, "1001");
    }
}
