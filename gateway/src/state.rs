use std::collections::HashMap;
use std::sync::Arc;

use call_tracker::CallTracker;
use chat_reflector::ChatReflector;
use compliance::{ComplianceGate, CountryCompliance};
use extension_provisioner::ExtensionProvisioner;
use media_cache::MediaUrlCache;
use pbx_mi::PbxMiClient;
use provider_registry::ProviderRegistry;
use sms_router::SmsRouter;
use store::Store;
use tokio::sync::RwLock;

/// Everything a route handler or background task needs, bundled behind one
/// `Clone`-able handle, following the teacher's single `AppState` per
/// binary (`services/api`/`services/pbx`).
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub push: Arc<push_bus::PushFanout>,
    pub pbx: Arc<PbxMiClient>,
    pub call_tracker: Arc<CallTracker>,
    pub provisioner: Arc<ExtensionProvisioner>,
    pub registry: Arc<ProviderRegistry>,
    pub media_cache: Arc<MediaUrlCache>,
    pub compliance_gate: Arc<ComplianceGate>,
    /// Swapped in whole on config reload rather than mutated in place —
    /// routing rules and the static fallback chain change together.
    pub router: Arc<RwLock<Arc<SmsRouter>>>,
    pub compliance_config: Arc<RwLock<HashMap<String, CountryCompliance>>>,
    pub prefix_country_map: Arc<RwLock<HashMap<String, String>>>,
    pub reflectors: Arc<RwLock<HashMap<String, Arc<ChatReflector>>>>,
    pub recipients: Arc<RwLock<Vec<i64>>>,
}

impl AppState {
    pub async fn country_for(&self, to: &str) -> Option<String> {
        let map = self.prefix_country_map.read().await;
        map.iter()
            .filter(|(prefix, _)| to.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, country)| country.clone())
    }

    pub async fn recipients(&self) -> Vec<i64> {
        self.recipients.read().await.clone()
    }
}
