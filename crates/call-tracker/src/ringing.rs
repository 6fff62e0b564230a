use std::collections::HashMap;

use models::RingingCall;

/// Tracks in-progress ringing rows keyed by PBX linked-id, plus which
/// linked-ids have already had their one-shot `incoming_call` event
/// published (invariant 4: exactly one per call id, no matter how many
/// `DialBegin`s are observed for it).
#[derive(Default)]
pub struct RingingRegistry {
    rows: HashMap<String, RingingCall>,
    notified: std::collections::HashSet<String>,
}

impl RingingRegistry {
    pub fn get(&self, call_id: &str) -> Option<&RingingCall> {
        self.rows.get(call_id)
    }

    pub fn all(&self) -> Vec<RingingCall> {
        self.rows.values().cloned().collect()
    }

    /// Inserts a brand new ringing row. Returns `true` the first time this
    /// call id is seen (caller should publish `incoming_call`), `false` if
    /// a row already existed (caller should just update it).
    pub fn open_or_touch(&mut self, row_if_new: impl FnOnce() -> RingingCall) -> (bool, &mut RingingCall) {
        let call_id = {
            // Peek at what the row would be keyed by without constructing it
            // twice; cheap since `row_if_new` runs once either way.
            let row = row_if_new();
            let call_id = row.call_id.clone();
            self.rows.entry(call_id.clone()).or_insert(row);
            call_id
        };
        let first_seen = self.notified.insert(call_id.clone());
        (first_seen, self.rows.get_mut(&call_id).unwrap())
    }

    pub fn close(&mut self, call_id: &str) -> Option<RingingCall> {
        self.notified.remove(call_id);
        self.rows.remove(call_id)
    }

    /// Rows that have been open longer than `max_age_secs`, for the
    /// watchdog sweep.
    pub fn stale(&self, now: i64, max_age_secs: i64) -> Vec<String> {
        self.rows
            .values()
            .filter(|row| now - row.first_notified_at >= max_age_secs)
            .map(|row| row.call_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(call_id: &str) -> RingingCall {
        RingingCall {
            call_id: call_id.to_string(),
            display_number: "0123456789".into(),
            display_name: None,
            line_name: None,
            extensions_ringing: Default::default(),
            channel: "PJSIP/GSM-Line1-aaa".into(),
            first_notified_at: 0,
        }
    }

    #[test]
    fn publishes_incoming_call_exactly_once_per_call_id() {
        let mut registry = RingingRegistry::default();
        let (first, r) = registry.open_or_touch(|| row("L1"));
        assert!(first);
        r.extensions_ringing.insert("1001".into());

        let (second, r2) = registry.open_or_touch(|| row("L1"));
        assert!(!second);
        r2.extensions_ringing.insert("1002".into());

        let final_row = registry.get("L1").unwrap();
        assert_eq!(final_row.extensions_ringing.len(), 2);
    }

    #[test]
    fn watchdog_finds_stale_rows() {
        let mut registry = RingingRegistry::default();
        registry.open_or_touch(|| row("L1"));
        assert_eq!(registry.stale(61, 60), vec!["L1".to_string()]);
        assert!(registry.stale(59, 60).is_empty());
    }
}
