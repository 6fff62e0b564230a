/// Tunables for PBX endpoint provisioning and the allocation policy.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Lowest extension number handed out when no extensions exist yet.
    pub start_from: i64,
    pub default_context: String,
    pub default_transport: String,
    pub default_codec_preference: Vec<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            start_from: 1000,
            default_context: "from-internal".to_string(),
            default_transport: "transport-udp".to_string(),
            default_codec_preference: vec!["opus".to_string(), "ulaw".to_string(), "alaw".to_string()],
        }
    }
}
