use regex::Regex;
use std::sync::OnceLock;

use models::CallDirection;

use crate::config::CallTrackerConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelClass {
    Trunk { line_name: Option<String> },
    Extension { extension: String },
}

fn extension_channel_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]+/(\d{3,4})-").unwrap())
}

fn trunk_channel_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]+/(.+)-[^-/]+$").unwrap())
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

/// `true` for channels synthesised by the dialplan itself (`Local/...`)
/// rather than a real trunk or extension leg.
pub fn is_local_channel(channel: &str) -> bool {
    channel.starts_with("Local/")
}

/// Resolves a trunk or extension-class channel per the `Newchannel`
/// handling rule, or `None` when the channel should be ignored entirely.
pub fn classify_channel(
    channel: &str,
    caller_id_num: &str,
    caller_id_name: Option<&str>,
    exten: Option<&str>,
    config: &CallTrackerConfig,
) -> Option<ChannelClass> {
    if is_local_channel(channel) {
        return None;
    }

    if let Some(caps) = extension_channel_re().captures(channel) {
        let extension = caps.get(1).unwrap().as_str().to_string();
        let dest = exten.unwrap_or(&extension);
        if dest == "s" || dest.len() < 3 {
            return None;
        }
        return Some(ChannelClass::Extension { extension });
    }

    if trunk_channel_re().is_match(channel) {
        if digit_count(caller_id_num) < 6 {
            return None;
        }
        let line_name = resolve_line_name(channel, caller_id_name, config);
        return Some(ChannelClass::Trunk { line_name });
    }

    None
}

/// Trunk/line name extraction: the channel identifier's middle segment
/// first, falling back to a substring match against the caller-id-name
/// when that segment doesn't map to anything configured.
fn resolve_line_name(channel: &str, caller_id_name: Option<&str>, config: &CallTrackerConfig) -> Option<String> {
    let raw = trunk_channel_re()
        .captures(channel)
        .map(|caps| caps.get(1).unwrap().as_str().to_string());

    if let Some(name) = caller_id_name {
        if let Some((_, display)) = config
            .line_name_table
            .iter()
            .find(|(substr, _)| name.to_lowercase().contains(&substr.to_lowercase()))
        {
            return Some(display.clone());
        }
    }
    raw
}

/// Direction per the `Newchannel` rule: incoming when the dialplan context
/// matches a trunk/DID pattern, otherwise outgoing when the caller id is
/// extension-shaped (`<=4` digits). Anything else defaults to incoming,
/// matching a trunk-class channel's usual shape.
pub fn classify_direction(context: &str, caller_id_num: &str, config: &CallTrackerConfig) -> CallDirection {
    if config.incoming_contexts.iter().any(|c| c.eq_ignore_ascii_case(context)) {
        return CallDirection::Incoming;
    }
    if config.outgoing_contexts.iter().any(|c| c.eq_ignore_ascii_case(context)) {
        return CallDirection::Outgoing;
    }
    if digit_count(caller_id_num) <= 4 {
        return CallDirection::Outgoing;
    }
    CallDirection::Incoming
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CallTrackerConfig {
        CallTrackerConfig {
            line_name_table: vec![("chiro".into(), "Chiro Clinic".into()), ("osteo".into(), "Osteopathy".into())],
            ..CallTrackerConfig::default()
        }
    }

    #[test]
    fn trunk_channel_requires_external_looking_caller() {
        let cfg = config();
        assert!(classify_channel("PJSIP/GSM-Line1-aaa", "+33123456789", None, None, &cfg).is_some());
        assert!(classify_channel("PJSIP/GSM-Line1-aaa", "1001", None, None, &cfg).is_none());
    }

    #[test]
    fn extension_channel_requires_plausible_destination() {
        let cfg = config();
        assert!(classify_channel("PJSIP/1001-xyz", "1002", None, Some("1001"), &cfg).is_some());
        assert!(classify_channel("PJSIP/1001-xyz", "1002", None, Some("s"), &cfg).is_none());
    }

    #[test]
    fn local_channels_are_skipped() {
        let cfg = config();
        assert!(classify_channel("Local/1001@from-internal-abc", "1002", None, None, &cfg).is_none());
    }

    #[test]
    fn line_name_falls_back_to_caller_id_name_substring() {
        let cfg = config();
        let resolved = resolve_line_name("PJSIP/Trunk2-xyz", Some("Dr Chiro Office"), &cfg);
        assert_eq!(resolved.as_deref(), Some("Chiro Clinic"));
    }

    #[test]
    fn direction_classification() {
        let cfg = config();
        assert_eq!(classify_direction("from-trunk", "+33123456789", &cfg), CallDirection::Incoming);
        assert_eq!(classify_direction("from-internal", "1001", &cfg), CallDirection::Outgoing);
    }
}
