//! Domain entities shared by every gateway crate.
//!
//! These mirror the store's row shapes directly (see `store::schema`) so
//! repositories can map `sqlx::FromRow` output straight into them without an
//! intermediate DTO layer. Wire-facing shapes that diverge from storage
//! (camelCase HTTP bodies, push-event payloads) live in `dto` instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Provider tags a `Chat`/`Message` can originate from. Deliberately open at
/// the string boundary (stored as text) but typed everywhere else so new
/// backends don't require a migration to add an enum variant at the DB layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Whatsapp,
    Sms,
    Voip,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Whatsapp => "whatsapp",
            ProviderKind::Sms => "sms",
            ProviderKind::Voip => "voip",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "whatsapp" => Some(ProviderKind::Whatsapp),
            "sms" => Some(ProviderKind::Sms),
            "voip" => Some(ProviderKind::Voip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    /// Backend-qualified, e.g. `sms_<remote>`. Stable across polling cycles.
    pub id: String,
    pub display_name: String,
    pub provider: ProviderKind,
    pub unread_count: i64,
    /// Seconds since epoch; monotonically >= max(message timestamps in chat).
    pub timestamp: i64,
    pub line_id: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Audio,
    Video,
    Document,
    Location,
    Sticker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    Received,
}

impl MessageStatus {
    /// Monotone rank along pending -> sent -> delivered -> read. `failed` and
    /// `received` sit outside the chain and are always accepted.
    fn rank(&self) -> Option<u8> {
        match self {
            MessageStatus::Pending => Some(0),
            MessageStatus::Sent => Some(1),
            MessageStatus::Delivered => Some(2),
            MessageStatus::Read => Some(3),
            MessageStatus::Failed | MessageStatus::Received => None,
        }
    }

    /// Whether transitioning from `self` to `next` is allowed under the
    /// store's monotonicity invariant (read-to-lower transitions discarded).
    pub fn may_transition_to(&self, next: MessageStatus) -> bool {
        if next == MessageStatus::Failed {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to >= from,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub from_me: bool,
    pub message_type: MessageType,
    pub content: String,
    pub sender_id: Option<String>,
    pub timestamp: i64,
    pub status: MessageStatus,
    pub media_url: Option<String>,
    pub raw_payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ringing,
    Answered,
    Missed,
    Busy,
    Failed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnsweredBy {
    pub user_id: i64,
    pub username: String,
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Local id, `pbx_<unique>`.
    pub id: String,
    pub direction: CallDirection,
    pub caller_number: String,
    pub called_number: String,
    pub caller_name: Option<String>,
    pub line_name: Option<String>,
    pub device_name: Option<String>,
    pub start_time: i64,
    pub answer_time: Option<i64>,
    pub end_time: Option<i64>,
    pub status: CallStatus,
    pub source: String,
    /// Backend unique id (e.g. the PBX `UniqueID`); unique when set.
    pub backend_unique_id: Option<String>,
    pub answered_by: Option<AnsweredBy>,
    pub seen: bool,
    pub notes: Option<String>,
    pub recording_url: Option<String>,
    pub raw_payload: Option<serde_json::Value>,
}

impl Call {
    /// Derived duration per the store invariant: `end - answer` when
    /// answered, else zero.
    pub fn duration(&self) -> i64 {
        match (self.status, self.answer_time, self.end_time) {
            (CallStatus::Answered, Some(answer), Some(end)) => (end - answer).max(0),
            _ => 0,
        }
    }
}

/// Transient, in-memory only; never persisted (see `call-tracker`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingingCall {
    pub call_id: String,
    pub display_number: String,
    pub display_name: Option<String>,
    pub line_name: Option<String>,
    pub extensions_ringing: HashSet<String>,
    pub channel: String,
    pub first_notified_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoipExtension {
    pub id: i64,
    pub user_id: i64,
    pub extension: String,
    pub secret: String,
    pub display_name: String,
    pub context: String,
    pub transport: String,
    pub codec_preference: Vec<String>,
    pub enabled: bool,
    pub webrtc_enabled: bool,
    pub synced_to_pbx: bool,
    pub sync_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub platform: String,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPushKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebPushSubscription {
    pub endpoint: String,
    pub user_id: i64,
    pub keys: WebPushKeys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderCapability {
    SendText,
    SendMedia,
    Receive,
    Templates,
    DeliveryReports,
    QrAuth,
    Groups,
}

/// Small hand-rolled bitset rather than pulling in `bitflags` for one use
/// site; one bit per `ProviderCapability` variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCapabilities(pub u16);

impl ProviderCapabilities {
    pub fn none() -> Self {
        Self(0)
    }

    fn bit(cap: ProviderCapability) -> u16 {
        1 << (cap as u16)
    }

    pub fn with(mut self, cap: ProviderCapability) -> Self {
        self.0 |= Self::bit(cap);
        self
    }

    pub fn has(&self, cap: ProviderCapability) -> bool {
        self.0 & Self::bit(cap) != 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub last_check: Option<i64>,
    pub consecutive_failures: u32,
    pub failures: u64,
    pub last_error: Option<String>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            last_check: None,
            consecutive_failures: 0,
            failures: 0,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInstanceInfo {
    pub id: String,
    pub provider_type: String,
    pub category: ProviderKind,
    pub enabled: bool,
    pub config: HashMap<String, serde_json::Value>,
    pub health: ProviderHealth,
    pub capabilities: ProviderCapabilities,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_monotonicity() {
        assert!(MessageStatus::Pending.may_transition_to(MessageStatus::Sent));
        assert!(MessageStatus::Sent.may_transition_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Read.may_transition_to(MessageStatus::Sent));
        assert!(MessageStatus::Read.may_transition_to(MessageStatus::Failed));
        assert!(MessageStatus::Pending.may_transition_to(MessageStatus::Failed));
    }

    #[test]
    fn call_duration_derivation() {
        let mut call = Call {
            id: "pbx_1".into(),
            direction: CallDirection::Incoming,
            caller_number: "0123456789".into(),
            called_number: "1001".into(),
            caller_name: None,
            line_name: None,
            device_name: None,
            start_time: 0,
            answer_time: Some(10),
            end_time: Some(70),
            status: CallStatus::Answered,
            source: "gsm".into(),
            backend_unique_id: Some("L1".into()),
            answered_by: None,
            seen: false,
            notes: None,
            recording_url: None,
            raw_payload: None,
        };
        assert_eq!(call.duration(), 60);
        call.status = CallStatus::Missed;
        assert_eq!(call.duration(), 0);
    }

    #[test]
    fn capability_bitset() {
        let caps = ProviderCapabilities::none()
            .with(ProviderCapability::SendText)
            .with(ProviderCapability::Receive);
        assert!(caps.has(ProviderCapability::SendText));
        assert!(caps.has(ProviderCapability::Receive));
        assert!(!caps.has(ProviderCapability::Templates));
    }
}
