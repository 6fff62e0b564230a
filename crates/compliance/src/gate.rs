use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::config::CountryCompliance;
use crate::segmentation::segment_count;

const RECENT_SEND_RETENTION_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub allowed: bool,
    pub reason: Option<String>,
    pub warnings: Vec<String>,
    pub modified_text: String,
}

impl CheckResult {
    fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            warnings: Vec::new(),
            modified_text: String::new(),
        }
    }
}

/// C10: pre-send compliance checks per country, with a mutex-guarded
/// recent-send map for the minimum-delay-between-SMS rule (§4.10, §5).
pub struct ComplianceGate {
    recent_sends: Mutex<HashMap<String, i64>>,
}

impl ComplianceGate {
    pub fn new() -> Self {
        Self {
            recent_sends: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, to: &str, text: &str, config: &CountryCompliance) -> CheckResult {
        self.check_at(Utc::now(), to, text, config)
    }

    /// Same as [`check`](Self::check) but with an explicit `now`, so
    /// scenario tests can pin exact window-edge instants.
    pub fn check_at(&self, now: DateTime<Utc>, to: &str, text: &str, config: &CountryCompliance) -> CheckResult {
        if !config.enabled {
            return CheckResult {
                allowed: true,
                reason: None,
                warnings: Vec::new(),
                modified_text: text.to_string(),
            };
        }

        if config.blocked_prefixes.iter().any(|p| to.starts_with(p.as_str())) {
            return CheckResult::reject("destination prefix is blocked");
        }
        if !config.allowed_prefixes.is_empty() && !config.allowed_prefixes.iter().any(|p| to.starts_with(p.as_str())) {
            return CheckResult::reject("destination prefix is not allowed");
        }

        if let Some(restrictions) = &config.time_restrictions {
            let Ok(tz): Result<Tz, _> = restrictions.timezone.parse() else {
                return CheckResult::reject(format!("unknown timezone {}", restrictions.timezone));
            };
            let local = now.with_timezone(&tz);
            let hour = local.hour();
            let in_window = if restrictions.start <= restrictions.end {
                hour >= restrictions.start && hour < restrictions.end
            } else {
                hour >= restrictions.start || hour < restrictions.end
            };
            if !in_window {
                return CheckResult::reject(format!(
                    "Envoi SMS interdit entre {}h et {}h (heure locale {})",
                    restrictions.end, restrictions.start, restrictions.timezone
                ));
            }
            if restrictions.blocked_weekdays().contains(&local.weekday()) {
                return CheckResult::reject(format!("Envoi SMS interdit le {:?}", local.weekday()));
            }
        }

        if let Some(last) = self.recent_sends.lock().unwrap().get(to).copied() {
            let elapsed = now.timestamp() - last;
            if elapsed < config.min_delay_secs {
                return CheckResult::reject("a message was sent to this destination too recently");
            }
        }

        let mut warnings = Vec::new();
        let mut modified_text = text.to_string();

        let has_stop = config
            .stop_keywords
            .iter()
            .any(|kw| text.to_ascii_uppercase().contains(&kw.to_ascii_uppercase()));
        if !has_stop && !config.stop_keywords.is_empty() {
            modified_text = format!("{text}\n{}", config.stop_clause_template);
            warnings.push("appended STOP clause".to_string());
        }

        let segments = segment_count(&modified_text, config.max_len_gsm7, config.max_len_ucs2);
        if segments >= 2 {
            warnings.push(format!("message will fragment into {segments} segments"));
        }

        self.record_send(now.timestamp(), to);

        CheckResult {
            allowed: true,
            reason: None,
            warnings,
            modified_text,
        }
    }

    fn record_send(&self, now: i64, to: &str) {
        let mut recent = self.recent_sends.lock().unwrap();
        recent.insert(to.to_string(), now);
        recent.retain(|_, ts| now - *ts < RECENT_SEND_RETENTION_SECS);
    }
}

impl Default for ComplianceGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn france() -> CountryCompliance {
        CountryCompliance::default()
    }

    #[test]
    fn rejects_outside_window_on_blocked_day_boundary() {
        let gate = ComplianceGate::new();
        // Monday 2024-01-08 23:15 Europe/Paris == 22:15 UTC.
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 22, 15, 0).unwrap();
        let result = gate.check_at(now, "+33600000000", "Bonjour", &france());
        assert!(!result.allowed);
        assert!(result.reason.unwrap().contains("interdit"));
    }

    #[test]
    fn window_end_hour_is_exclusive() {
        let gate = ComplianceGate::new();
        // Monday 2024-01-08 22:00 Europe/Paris local == 21:00 UTC, end=22 exclusive.
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 21, 0, 0).unwrap();
        let result = gate.check_at(now, "+33611111111", "Bonjour", &france());
        assert!(!result.allowed);
    }

    #[test]
    fn window_start_hour_is_inclusive() {
        let gate = ComplianceGate::new();
        // Monday 2024-01-08 08:00 Europe/Paris local == 07:00 UTC, start=8 inclusive.
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 7, 0, 0).unwrap();
        let result = gate.check_at(now, "+33622222222", "Bonjour", &france());
        assert!(result.allowed);
    }

    #[test]
    fn appends_stop_clause_when_missing() {
        let gate = ComplianceGate::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap();
        let result = gate.check_at(now, "+33633333333", "Bonjour", &france());
        assert!(result.allowed);
        assert!(result.modified_text.contains("STOP"));
        assert!(result.warnings.iter().any(|w| w.contains("STOP")));
    }

    #[test]
    fn rejects_second_send_within_min_delay() {
        let gate = ComplianceGate::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap();
        let cfg = france();
        assert!(gate.check_at(now, "+33644444444", "STOP Bonjour", &cfg).allowed);
        let soon_after = now + chrono::Duration::seconds(5);
        let second = gate.check_at(soon_after, "+33644444444", "STOP Bonjour", &cfg);
        assert!(!second.allowed);
    }

    #[test]
    fn blocked_prefix_is_rejected_without_side_effects() {
        let gate = ComplianceGate::new();
        let mut cfg = france();
        cfg.blocked_prefixes = vec!["+33700".to_string()];
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap();
        let result = gate.check_at(now, "+33700000000", "Bonjour", &cfg);
        assert!(!result.allowed);
        assert!(gate.recent_sends.lock().unwrap().is_empty());
    }
}
