use models::{Role, User};
use sqlx::{Row, SqlitePool};

use crate::error::{classify, Result, StoreError};

#[derive(Clone)]
pub struct UserRepo {
    pool: SqlitePool,
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Admin => "admin",
    }
}

fn role_from_str(s: &str) -> Role {
    match s {
        "admin" => Role::Admin,
        _ => Role::User,
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role: role_from_str(&role),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}

impl UserRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, username: &str, password_hash: &str, role: Role) -> Result<User> {
        let now = chrono::Utc::now().to_rfc3339();
        let res = sqlx::query(
            "INSERT INTO users (username, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role_to_str(role))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        self.get(res.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Fatal)?
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        row_to_user(&row).map_err(StoreError::Fatal)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        row.as_ref()
            .map(row_to_user)
            .transpose()
            .map_err(StoreError::Fatal)
    }

    /// Cascades to sessions/tokens/extensions via `ON DELETE CASCADE`.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Fatal)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }
}
