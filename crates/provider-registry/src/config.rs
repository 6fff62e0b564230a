use std::collections::HashMap;

use models::ProviderKind;
use serde::{Deserialize, Serialize};

/// One entry of the `providers.<category>.<id>` config table (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfigEntry {
    pub id: String,
    pub category: ProviderKind,
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}
