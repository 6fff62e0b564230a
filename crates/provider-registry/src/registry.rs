use std::sync::Arc;

use dashmap::DashMap;
use models::{ProviderHealth, ProviderInstanceInfo};

use crate::config::ProviderConfigEntry;
use crate::error::{ProviderError, Result};
use crate::provider::Provider;

/// Constructs a live `Provider` from one config entry. Factories are
/// registered per `type` string so new backends plug in without the
/// registry knowing their concrete types, per §4.6/§9.
pub type ProviderFactory = Arc<dyn Fn(&ProviderConfigEntry) -> Result<Arc<dyn Provider>> + Send + Sync>;

/// C6: the provider registry. Holds live instances plus their runtime
/// health/config snapshot, and hot-reload diff-applies config changes:
/// newly enabled providers are initialised, newly disabled ones are
/// disconnected. A reader-mostly map per §5 — `DashMap` gives the
/// copy-on-write-ish concurrent access the concurrency model calls for.
pub struct ProviderRegistry {
    factories: DashMap<String, ProviderFactory>,
    instances: DashMap<String, Arc<dyn Provider>>,
    info: DashMap<String, ProviderInstanceInfo>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
            instances: DashMap::new(),
            info: DashMap::new(),
        }
    }

    pub fn register_factory(&self, provider_type: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(provider_type.into(), factory);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.instances.get(id).map(|entry| entry.clone())
    }

    pub fn info(&self, id: &str) -> Option<ProviderInstanceInfo> {
        self.info.get(id).map(|entry| entry.clone())
    }

    pub fn list(&self) -> Vec<ProviderInstanceInfo> {
        self.info.iter().map(|entry| entry.clone()).collect()
    }

    pub fn is_healthy(&self, id: &str) -> bool {
        self.info.get(id).map(|i| i.health.healthy).unwrap_or(false)
    }

    /// Diff-applies `entries` against the currently loaded set: providers
    /// newly present/enabled are constructed and initialised; providers
    /// removed or newly disabled are disconnected and dropped. A single
    /// failing provider is logged and left unhealthy; it never blocks the
    /// rest of the load, per §4.6.
    pub async fn load(&self, entries: &[ProviderConfigEntry]) {
        let wanted: std::collections::HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();

        let to_remove: Vec<String> = self
            .instances
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|id| !wanted.contains(id.as_str()))
            .collect();
        for id in to_remove {
            self.disconnect_and_remove(&id).await;
        }

        for entry in entries {
            if !entry.enabled {
                if self.instances.contains_key(&entry.id) {
                    self.disconnect_and_remove(&entry.id).await;
                } else {
                    self.info.insert(entry.id.clone(), disabled_info(entry));
                }
                continue;
            }
            if self.instances.contains_key(&entry.id) {
                continue;
            }
            self.spawn_one(entry).await;
        }
    }

    async fn spawn_one(&self, entry: &ProviderConfigEntry) {
        let Some(factory) = self.factories.get(&entry.provider_type).map(|f| f.clone()) else {
            tracing::warn!(provider_type = %entry.provider_type, "no factory registered for provider type");
            self.info.insert(entry.id.clone(), unhealthy_info(entry, "no factory registered"));
            return;
        };

        let provider = match factory(entry) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(provider_id = %entry.id, error = %err, "failed to construct provider");
                self.info.insert(entry.id.clone(), unhealthy_info(entry, &err.to_string()));
                return;
            }
        };

        match provider.initialize().await {
            Ok(()) => {
                self.info.insert(entry.id.clone(), healthy_info(entry, provider.capabilities()));
                self.instances.insert(entry.id.clone(), provider);
            }
            Err(err) => {
                tracing::warn!(provider_id = %entry.id, error = %err, "provider failed to initialize");
                self.info.insert(entry.id.clone(), unhealthy_info(entry, &err.to_string()));
            }
        }
    }

    async fn disconnect_and_remove(&self, id: &str) {
        if let Some((_, provider)) = self.instances.remove(id) {
            if let Err(err) = provider.disconnect().await {
                tracing::warn!(provider_id = %id, error = %err, "error disconnecting provider");
            }
        }
        self.info.remove(id);
    }

    pub fn mark_failure(&self, id: &str, error: &str) {
        if let Some(mut info) = self.info.get_mut(id) {
            info.health.failures += 1;
            info.health.consecutive_failures += 1;
            info.health.last_error = Some(error.to_string());
            info.health.last_check = Some(now());
            if info.health.consecutive_failures >= 3 {
                info.health.healthy = false;
            }
        }
    }

    pub fn mark_success(&self, id: &str) {
        if let Some(mut info) = self.info.get_mut(id) {
            info.health.consecutive_failures = 0;
            info.health.healthy = true;
            info.health.last_check = Some(now());
        }
    }

    pub fn set_healthy(&self, id: &str, healthy: bool) {
        if let Some(mut info) = self.info.get_mut(id) {
            info.health.healthy = healthy;
            info.health.last_check = Some(now());
            if healthy {
                info.health.consecutive_failures = 0;
            }
        }
    }

    /// Runs `get_status` on every loaded provider, reconciling `healthy`
    /// against the result. Returns the ids that flipped unhealthy ->
    /// healthy, for `provider_recovered` events (§4.7).
    pub async fn health_check_all(&self) -> Vec<String> {
        let ids: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        let mut recovered = Vec::new();
        for id in ids {
            let Some(provider) = self.get(&id) else { continue };
            let was_healthy = self.is_healthy(&id);
            match provider.get_status().await {
                Ok(health) => {
                    self.set_healthy(&id, health.healthy);
                    if !was_healthy && health.healthy {
                        recovered.push(id);
                    }
                }
                Err(err) => {
                    self.mark_failure(&id, &err.to_string());
                }
            }
        }
        recovered
    }

    pub fn require_healthy(&self, id: &str) -> Result<Arc<dyn Provider>> {
        if !self.is_healthy(id) {
            return Err(ProviderError::Unavailable(id.to_string()));
        }
        self.get(id).ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> i64 {
    chrono_now()
}

fn chrono_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn healthy_info(entry: &ProviderConfigEntry, capabilities: models::ProviderCapabilities) -> ProviderInstanceInfo {
    ProviderInstanceInfo {
        id: entry.id.clone(),
        provider_type: entry.provider_type.clone(),
        category: entry.category,
        enabled: true,
        config: entry.config.clone(),
        health: ProviderHealth::default(),
        capabilities,
    }
}

fn unhealthy_info(entry: &ProviderConfigEntry, error: &str) -> ProviderInstanceInfo {
    ProviderInstanceInfo {
        id: entry.id.clone(),
        provider_type: entry.provider_type.clone(),
        category: entry.category,
        enabled: true,
        config: entry.config.clone(),
        health: ProviderHealth {
            healthy: false,
            last_check: Some(now()),
            consecutive_failures: 1,
            failures: 1,
            last_error: Some(error.to_string()),
        },
        capabilities: models::ProviderCapabilities::none(),
    }
}

fn disabled_info(entry: &ProviderConfigEntry) -> ProviderInstanceInfo {
    ProviderInstanceInfo {
        id: entry.id.clone(),
        provider_type: entry.provider_type.clone(),
        category: entry.category,
        enabled: false,
        config: entry.config.clone(),
        health: ProviderHealth::default(),
        capabilities: models::ProviderCapabilities::none(),
    }
}
