use std::sync::Arc;

use dashmap::DashMap;
use pbx_mi::PbxMiClient;
use rand::distributions::Alphanumeric;
use rand::Rng;
use store::Store;
use tokio::sync::Mutex;

use crate::config::ProvisionerConfig;
use crate::error::{ProvisionerError, Result};
use crate::status::{parse_endpoint_status, ExtensionStatus};

fn endpoint_family(extension: &str) -> String {
    format!("PJSIP_ENDPOINT/{extension}")
}

fn auth_family(extension: &str) -> String {
    format!("PJSIP_AUTH/{extension}")
}

fn aor_family(extension: &str) -> String {
    format!("PJSIP_AOR/{extension}")
}

fn generate_secret() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(24).map(char::from).collect()
}

/// C5: reconciles `VoipExtension` rows in the store with PJSIP endpoint
/// state in the PBX, via `pbx-mi`'s AstDB primitives.
pub struct ExtensionProvisioner {
    pbx: Arc<PbxMiClient>,
    store: Store,
    config: ProvisionerConfig,
    /// Serialises PBX mutations against the same extension number so a
    /// concurrent `update_secret` and `delete_extension` can't interleave.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ExtensionProvisioner {
    pub fn new(pbx: Arc<PbxMiClient>, store: Store, config: ProvisionerConfig) -> Self {
        Self { pbx, store, config, locks: DashMap::new() }
    }

    fn lock_for(&self, extension: &str) -> Arc<Mutex<()>> {
        self.locks.entry(extension.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    async fn push_config(&self, extension: &str, secret: &str, context: &str, transport: &str) -> pbx_mi::Result<()> {
        self.pbx.db_put(&auth_family(extension), "auth_type", "userpass").await?;
        self.pbx.db_put(&auth_family(extension), "username", extension).await?;
        self.pbx.db_put(&auth_family(extension), "password", secret).await?;

        self.pbx.db_put(&aor_family(extension), "max_contacts", "1").await?;
        self.pbx.db_put(&aor_family(extension), "remove_existing", "yes").await?;

        self.pbx.db_put(&endpoint_family(extension), "context", context).await?;
        self.pbx.db_put(&endpoint_family(extension), "transport", transport).await?;
        self.pbx
            .db_put(&endpoint_family(extension), "allow", &self.config.default_codec_preference.join(","))
            .await?;
        self.pbx.db_put(&endpoint_family(extension), "auth", extension).await?;
        self.pbx.db_put(&endpoint_family(extension), "aors", extension).await?;
        Ok(())
    }

    /// Allocates the next free extension number, pushes its PJSIP triple to
    /// the PBX, and reloads. Allocation (and the `synced_to_pbx` flag) is
    /// always persisted even when the PBX push fails, so the extension shows
    /// up with `sync_error` set rather than silently vanishing.
    pub async fn create_extension(&self, user_id: i64, display_name: &str) -> Result<models::VoipExtension> {
        let secret = generate_secret();
        let extension = self
            .store
            .extensions
            .allocate_next(
                user_id,
                self.config.start_from,
                display_name,
                &secret,
                &self.config.default_context,
                &self.config.default_transport,
            )
            .await?;

        let lock = self.lock_for(&extension.extension);
        let _guard = lock.lock().await;

        let push_result = match self
            .push_config(&extension.extension, &secret, &self.config.default_context, &self.config.default_transport)
            .await
        {
            Ok(()) => self.pbx.reload("pjsip").await,
            Err(err) => Err(err),
        };

        match push_result {
            Ok(()) => {
                self.store.extensions.set_sync_status(&extension.extension, true, None).await?;
                Ok(models::VoipExtension { synced_to_pbx: true, sync_error: None, ..extension })
            }
            Err(err) => {
                let message = err.to_string();
                self.store.extensions.set_sync_status(&extension.extension, false, Some(&message)).await?;
                Ok(models::VoipExtension { synced_to_pbx: false, sync_error: Some(message), ..extension })
            }
        }
    }

    pub async fn delete_extension(&self, extension: &str) -> Result<()> {
        let lock = self.lock_for(extension);
        let _guard = lock.lock().await;

        self.pbx.db_del_tree(&endpoint_family(extension)).await?;
        self.pbx.db_del_tree(&auth_family(extension)).await?;
        self.pbx.db_del_tree(&aor_family(extension)).await?;
        self.pbx.reload("pjsip").await?;
        self.store.extensions.delete(extension).await?;
        Ok(())
    }

    pub async fn update_secret(&self, extension: &str, secret: &str) -> Result<()> {
        let lock = self.lock_for(extension);
        let _guard = lock.lock().await;

        self.pbx.db_put(&auth_family(extension), "password", secret).await?;
        self.pbx.reload("pjsip").await?;
        self.store.extensions.set_secret(extension, secret).await?;
        Ok(())
    }

    pub async fn get_status(&self, extension: &str) -> Result<ExtensionStatus> {
        if self.store.extensions.get_by_extension(extension).await?.is_none() {
            return Err(ProvisionerError::NotFound(extension.to_string()));
        }
        let output = self.pbx.send_cli(&format!("pjsip show endpoint {extension}")).await?;
        Ok(parse_endpoint_status(extension, &output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbx_mi::PbxMiConfig;

    async fn test_store() -> Store {
        let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
        sqlx::migrate!("../store/migrations").run(&pool).await.unwrap();
        Store::from_pool(pool)
    }

    #[tokio::test]
    async fn create_extension_persists_sync_error_when_pbx_unreachable() {
        let store = test_store().await;
        let users = &store.users;
        let user = users.create("alice", "hash", models::Role::User).await.unwrap();

        let pbx = PbxMiClient::new(PbxMiConfig::default());
        let provisioner = ExtensionProvisioner::new(pbx, store.clone(), ProvisionerConfig::default());

        let extension = provisioner.create_extension(user.id, "Alice").await.unwrap();
        assert_eq!(extension.extension, "1000");
        assert!(!extension.synced_to_pbx);
        assert!(extension.sync_error.is_some());

        let stored = store.extensions.get_by_extension("1000").await.unwrap().unwrap();
        assert!(!stored.synced_to_pbx);
    }

    #[tokio::test]
    async fn get_status_rejects_unknown_extension() {
        let store = test_store().await;
        let pbx = PbxMiClient::new(PbxMiConfig::default());
        let provisioner = ExtensionProvisioner::new(pbx, store, ProvisionerConfig::default());
        let err = provisioner.get_status("9999").await.unwrap_err();
        assert!(matches!(err, ProvisionerError::NotFound(_)));
    }
}
