use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// Send-window boundaries, end exclusive per §8 boundary behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRestrictions {
    /// Hour of day, `[0, 24)`, inclusive start.
    pub start: u32,
    /// Hour of day, `[0, 24)`, exclusive end.
    pub end: u32,
    /// IANA timezone name, e.g. `"Europe/Paris"`.
    pub timezone: String,
    #[serde(default)]
    pub blocked_days: Vec<String>,
}

impl TimeRestrictions {
    pub fn blocked_weekdays(&self) -> Vec<Weekday> {
        self.blocked_days
            .iter()
            .filter_map(|d| parse_weekday(d))
            .collect()
    }
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Per-country compliance configuration (§4.10, §6 `compliance.sms.<country>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryCompliance {
    pub enabled: bool,
    pub stop_keywords: Vec<String>,
    pub time_restrictions: Option<TimeRestrictions>,
    pub max_len_gsm7: usize,
    pub max_len_ucs2: usize,
    pub concat_segment_cap: usize,
    pub stop_clause_template: String,
    pub min_delay_secs: i64,
    pub allowed_prefixes: Vec<String>,
    pub blocked_prefixes: Vec<String>,
}

impl Default for CountryCompliance {
    fn default() -> Self {
        Self {
            enabled: true,
            stop_keywords: vec!["STOP".to_string()],
            time_restrictions: Some(TimeRestrictions {
                start: 8,
                end: 22,
                timezone: "Europe/Paris".to_string(),
                blocked_days: vec!["sunday".to_string()],
            }),
            max_len_gsm7: 160,
            max_len_ucs2: 70,
            concat_segment_cap: 3,
            stop_clause_template: "STOP au {stop_number}".to_string(),
            min_delay_secs: 10,
            allowed_prefixes: Vec::new(),
            blocked_prefixes: Vec::new(),
        }
    }
}
