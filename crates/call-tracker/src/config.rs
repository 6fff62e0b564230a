/// Site-tunable knobs for channel classification and CDR derivation.
/// The exact substring table is deliberately not hard-coded (see the
/// `reload pjsip` / trunk-naming note in the design notes) — the gateway
/// binary loads this from its TOML config.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CallTrackerConfig {
    /// Dialplan contexts that mark an incoming call (`from-trunk`, `from-did`, ...).
    pub incoming_contexts: Vec<String>,
    /// Dialplan contexts that mark an outgoing call (`from-internal`, `outbound`, ...).
    pub outgoing_contexts: Vec<String>,
    /// Destination contexts on a CDR that indicate a trunk-leg duplicate of
    /// an outgoing call and should be skipped.
    pub gateway_destination_markers: Vec<String>,
    /// Source values that mean "no usable caller id" on a CDR.
    pub gateway_source_markers: Vec<String>,
    /// Fallback literal used when no DID is configured and the source needs masking.
    pub default_did: Option<String>,
    /// E.g. `"+590"`, stripped and replaced with a leading `0`.
    pub national_prefix: Option<String>,
    /// Substring → display name, checked against caller-id-name when the
    /// channel-identifier regex doesn't yield a usable trunk/line name.
    pub line_name_table: Vec<(String, String)>,
    /// Seconds a ringing row may live without a closing event before the
    /// watchdog force-closes it.
    pub ringing_watchdog_secs: i64,
}

impl Default for CallTrackerConfig {
    fn default() -> Self {
        Self {
            incoming_contexts: vec!["from-trunk".into(), "from-did".into(), "ext-group".into()],
            outgoing_contexts: vec!["from-internal".into(), "outbound".into()],
            gateway_destination_markers: vec!["gateway".into(), "trunk-out".into()],
            gateway_source_markers: vec!["gateway".into(), "s".into()],
            default_did: None,
            national_prefix: None,
            line_name_table: Vec::new(),
            ringing_watchdog_secs: 60,
        }
    }
}
