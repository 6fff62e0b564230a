//! Wire-facing shapes: HTTP request/response bodies (§6 of the spec) and the
//! typed push-bus events delivered over long-lived subscriber streams (§4.2).
//! Kept separate from `models` because these are camelCase JSON contracts
//! with external callers, not storage rows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

// ---- POST /sms/send ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    pub to: String,
    pub message: String,
    pub from: Option<String>,
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsResponse {
    pub success: bool,
    pub message_id: String,
    pub chat_id: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modem_id: Option<String>,
}

// ---- POST /voip/answer ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCallRequest {
    pub call_id: String,
    pub extension: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ---- POST /voip/reject ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectCallRequest {
    pub call_id: String,
}

// ---- GET /voip/ringing ----

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RingingCallDto {
    pub call_id: String,
    pub caller_number: String,
    pub caller_name: Option<String>,
    pub line_name: Option<String>,
    pub extension: Option<String>,
    pub channel: String,
    pub start_time: i64,
    pub direction: String,
    pub status: String,
    pub extensions_ringing: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RingingCallsResponse {
    pub calls: Vec<RingingCallDto>,
}

// ---- POST /voip/originate ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginateRequest {
    pub channel: Option<String>,
    pub from: Option<String>,
    pub destination: Option<String>,
    pub exten: Option<String>,
    pub caller_id: Option<String>,
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginateResponse {
    pub success: bool,
    pub call_id: String,
}

// ---- GET /providers/status ----

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatusDto {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvidersStatusResponse {
    pub providers: Vec<ProviderStatusDto>,
    pub timestamp: i64,
}

// ---- GET /setup/status ----

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStepDto {
    pub id: String,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatusResponse {
    pub setup_needed: bool,
    pub current_step: String,
    pub admin_password_changed: bool,
    pub steps: Vec<SetupStepDto>,
}

// ---- Push bus events (§4.2) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    NewMessage {
        chat_id: String,
        message_id: String,
        from_me: bool,
        preview: String,
        timestamp: i64,
    },
    MessageStatus {
        chat_id: String,
        message_id: String,
        status: String,
    },
    IncomingCall {
        call_id: String,
        caller_number: String,
        caller_name: Option<String>,
        line_name: Option<String>,
        extension: Option<String>,
    },
    CallEnded {
        call_id: String,
        status: String,
    },
    MissedCall {
        call_id: String,
        caller_number: String,
    },
    CallHistoryUpdate {
        call_id: String,
    },
    ProviderStatusChanged {
        provider_id: String,
        healthy: bool,
    },
}

impl PushEvent {
    /// Critical events are never dropped under subscriber backpressure —
    /// the subscriber is disconnected instead, to preserve ringing semantics.
    pub fn is_critical(&self) -> bool {
        matches!(self, PushEvent::IncomingCall { .. } | PushEvent::CallEnded { .. })
    }

    /// Chat id used for mobile-push dedupe keying, when applicable.
    pub fn dedupe_key(&self) -> Option<&str> {
        match self {
            PushEvent::NewMessage { chat_id, .. } => Some(chat_id),
            _ => None,
        }
    }
}
