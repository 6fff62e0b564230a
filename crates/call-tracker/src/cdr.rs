use models::{Call, CallDirection, CallStatus};

use crate::classify::classify_direction;
use crate::config::CallTrackerConfig;
use crate::event::PbxEvent;

fn sanitize_source(source: &str, config: &CallTrackerConfig) -> String {
    let is_marker = source.is_empty()
        || config
            .gateway_source_markers
            .iter()
            .any(|m| m.eq_ignore_ascii_case(source));
    if is_marker {
        config.default_did.clone().unwrap_or_else(|| "masked".to_string())
    } else {
        source.to_string()
    }
}

fn apply_national_cosmetics(number: &str, config: &CallTrackerConfig) -> String {
    match &config.national_prefix {
        Some(prefix) if number.starts_with(prefix.as_str()) => {
            format!("0{}", &number[prefix.len()..])
        }
        _ => number.to_string(),
    }
}

fn status_from_disposition(disposition: &str) -> CallStatus {
    match disposition.to_ascii_uppercase().as_str() {
        "ANSWERED" => CallStatus::Answered,
        "NO ANSWER" => CallStatus::Missed,
        "BUSY" => CallStatus::Busy,
        "FAILED" | "CONGESTION" => CallStatus::Failed,
        _ => CallStatus::Failed,
    }
}

/// `true` when this CDR is a trunk-leg duplicate of an outgoing call and
/// should be skipped entirely rather than written as a second row.
fn is_trunk_leg_duplicate(destination_context: &str, dest_channel: Option<&str>, config: &CallTrackerConfig) -> bool {
    let looks_like_gateway = |s: &str| {
        config
            .gateway_destination_markers
            .iter()
            .any(|m| s.to_lowercase().contains(&m.to_lowercase()))
    };
    if looks_like_gateway(destination_context) {
        return true;
    }
    dest_channel.map(looks_like_gateway).unwrap_or(false)
}

/// Composes a complete call row from a `CDR` event, or `None` when the row
/// should be skipped (trunk-leg duplicate). Deduplication on backend unique
/// id is handled downstream by `CallRepo::insert_if_new`.
pub fn derive_call(event: &PbxEvent, config: &CallTrackerConfig) -> Option<Call> {
    let PbxEvent::Cdr {
        unique_id,
        source,
        destination,
        destination_context,
        disposition,
        start_time,
        answer_time,
        end_time,
        channel: _,
        dest_channel,
    } = event
    else {
        return None;
    };

    if is_trunk_leg_duplicate(destination_context, dest_channel.as_deref(), config) {
        return None;
    }

    // A gateway-only channel (no real extension leg) is always incoming.
    let direction = if dest_channel.is_none() {
        CallDirection::Incoming
    } else {
        classify_direction(destination_context, source, config)
    };

    let caller_number = apply_national_cosmetics(&sanitize_source(source, config), config);

    Some(Call {
        id: format!("pbx_{unique_id}"),
        direction,
        caller_number,
        called_number: destination.clone(),
        caller_name: None,
        line_name: None,
        device_name: None,
        start_time: start_time.unwrap_or_default(),
        answer_time: *answer_time,
        end_time: *end_time,
        status: status_from_disposition(disposition),
        source: "pbx".to_string(),
        backend_unique_id: Some(unique_id.clone()),
        answered_by: None,
        seen: false,
        notes: None,
        recording_url: None,
        raw_payload: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CallTrackerConfig {
        CallTrackerConfig {
            national_prefix: Some("+33".into()),
            ..CallTrackerConfig::default()
        }
    }

    fn cdr() -> PbxEvent {
        PbxEvent::Cdr {
            unique_id: "L1".into(),
            source: "+33123456789".into(),
            destination: "1001".into(),
            destination_context: "from-trunk".into(),
            disposition: "ANSWERED".into(),
            start_time: Some(0),
            answer_time: Some(10),
            end_time: Some(70),
            channel: Some("PJSIP/GSM-Line1-aaa".into()),
            dest_channel: Some("PJSIP/1001-xyz".into()),
        }
    }

    #[test]
    fn derives_answered_call_with_national_cosmetics() {
        let call = derive_call(&cdr(), &config()).unwrap();
        assert_eq!(call.caller_number, "0123456789");
        assert_eq!(call.status, CallStatus::Answered);
        assert_eq!(call.duration(), 60);
        assert_eq!(call.backend_unique_id.as_deref(), Some("L1"));
    }

    #[test]
    fn skips_trunk_leg_duplicates() {
        let mut event = cdr();
        if let PbxEvent::Cdr { destination_context, .. } = &mut event {
            *destination_context = "trunk-out".into();
        }
        assert!(derive_call(&event, &config()).is_none());
    }

    #[test]
    fn masks_empty_source() {
        let mut event = cdr();
        if let PbxEvent::Cdr { source, .. } = &mut event {
            *source = String::new();
        }
        let call = derive_call(&event, &config()).unwrap();
        assert_eq!(call.caller_number, "masked");
    }
}
