use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, StoreError};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$changeme$changeme";

/// Opens (creating if absent) the embedded SQLite database under
/// `data_dir/gateway.db`, enables WAL so readers never block the writer, runs
/// pending migrations, and seeds the default admin user on first start.
///
/// Startup failures here are fatal and abort the process per §7.
pub async fn open(data_dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Fatal(sqlx::Error::Io(e)))?;
    let db_path = data_dir.join("gateway.db");

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
        .map_err(StoreError::Fatal)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(StoreError::Fatal)?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StoreError::Fatal(sqlx::Error::Migrate(Box::new(e))))?;

    seed_admin(&pool).await?;

    Ok(pool)
}

/// Seeds a default admin user and the `admin_password_changed=false` flag on
/// first start, per §4.1. The setup surface (external, out of scope here)
/// refuses to complete until an operator flips that flag.
async fn seed_admin(pool: &SqlitePool) -> Result<()> {
    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
        .bind(DEFAULT_ADMIN_USERNAME)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::Fatal)?;

    if existing.is_some() {
        return Ok(());
    }

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO users (username, password_hash, role, created_at, updated_at) VALUES (?, ?, 'admin', ?, ?)",
    )
    .bind(DEFAULT_ADMIN_USERNAME)
    .bind(DEFAULT_ADMIN_PASSWORD_HASH)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(StoreError::Fatal)?;

    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES ('admin_password_changed', 'false', ?)",
    )
    .bind(&now)
    .execute(pool)
    .await
    .map_err(StoreError::Fatal)?;

    tracing::warn!("seeded default admin user with well-known password; setup is incomplete until it is changed");
    Ok(())
}
