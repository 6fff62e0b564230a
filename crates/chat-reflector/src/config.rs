#[derive(Debug, Clone)]
pub struct ReflectorConfig {
    pub sync_interval_ms: u64,
    pub max_sync_interval_ms: u64,
    /// §4.8 Open Question resolution: when true, the very first poll for a
    /// conversation not yet seen locally fetches with `first_boot_limit`
    /// instead of the usual bounded window.
    pub full_history_on_first_boot: bool,
    pub recent_window: u32,
    pub first_boot_limit: u32,
    /// How many consecutive identical poll errors get logged before going
    /// quiet until either recovery or the error text changes.
    pub max_repeat_logs: u32,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: 5_000,
            max_sync_interval_ms: 60_000,
            full_history_on_first_boot: false,
            recent_window: 20,
            first_boot_limit: 1_000,
            max_repeat_logs: 3,
        }
    }
}
