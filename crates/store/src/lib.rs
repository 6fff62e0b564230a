//! C1: the embedded relational store. A single SQLite database (WAL mode)
//! accessed through typed repositories, one per entity in §3 of the spec.
//!
//! Readers proceed concurrently (SQLite + WAL); writers are naturally
//! serialised by SQLite's single-writer model, which satisfies §5's "single
//! writer discipline" without an extra mutation channel.

mod calls;
mod chats;
mod error;
mod extensions;
mod messages;
mod pool;
mod push_tokens;
mod sessions;
mod settings;
mod users;

pub use calls::CallRepo;
pub use chats::ChatRepo;
pub use error::{classify, Result, StoreError};
pub use extensions::VoipExtensionRepo;
pub use messages::MessageRepo;
pub use pool::{open, DEFAULT_ADMIN_PASSWORD_HASH, DEFAULT_ADMIN_USERNAME};
pub use push_tokens::{PushTokenRepo, WebPushSubscriptionRepo};
pub use sessions::SessionRepo;
pub use settings::SettingRepo;
pub use users::UserRepo;

use sqlx::SqlitePool;

/// Bundles every repository behind one handle so callers (the `gateway`
/// binary, `call-tracker`, `chat-reflector`, ...) hold a single `Store`
/// rather than threading nine pool clones around.
#[derive(Clone)]
pub struct Store {
    pub users: UserRepo,
    pub sessions: SessionRepo,
    pub settings: SettingRepo,
    pub chats: ChatRepo,
    pub messages: MessageRepo,
    pub calls: CallRepo,
    pub extensions: VoipExtensionRepo,
    pub push_tokens: PushTokenRepo,
    pub web_push: WebPushSubscriptionRepo,
    pub pool: SqlitePool,
}

impl Store {
    pub async fn open(data_dir: &std::path::Path) -> Result<Self> {
        let pool = pool::open(data_dir).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            users: UserRepo::new(pool.clone()),
            sessions: SessionRepo::new(pool.clone()),
            settings: SettingRepo::new(pool.clone()),
            chats: ChatRepo::new(pool.clone()),
            messages: MessageRepo::new(pool.clone()),
            calls: CallRepo::new(pool.clone()),
            extensions: VoipExtensionRepo::new(pool.clone()),
            push_tokens: PushTokenRepo::new(pool.clone()),
            web_push: WebPushSubscriptionRepo::new(pool.clone()),
            pool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_and_seeds_admin() {
        let dir = std::env::temp_dir().join(format!("gateway-store-test-{}", uuid_like()));
        let store = Store::open(&dir).await.unwrap();
        let admin = store.users.get_by_username(DEFAULT_ADMIN_USERNAME).await.unwrap();
        assert!(admin.is_some());
        let flag = store.settings.get("admin_password_changed").await.unwrap();
        assert_eq!(flag.unwrap().value, serde_json::json!(false));
        let _ = std::fs::remove_dir_all(&dir);
    }

    fn uuid_like() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }
}
