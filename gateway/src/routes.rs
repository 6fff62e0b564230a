//! The §6 HTTP boundary: the normative subset of routes the core exposes,
//! served by `axum`, following the teacher's `services/api`/`services/pbx`
//! handler style (typed extractors, `State<AppState>`, JSON envelopes).

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use dto::{
    AnswerCallRequest, OriginateRequest, OriginateResponse, ProviderStatusDto, ProvidersStatusResponse,
    RejectCallRequest, RingingCallDto, RingingCallsResponse, SendSmsRequest, SendSmsResponse, SetupStatusResponse,
    SetupStepDto, SuccessResponse,
};
use provider_registry::SendOptions;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn health() -> &'static str {
    "ok"
}

/// `POST /sms/send`. Runs the compliance gate (when the destination
/// resolves to a configured country) before handing off to the router, per
/// §7 ("a compliance rejection is never surfaced as a 5xx, and never
/// reaches the downstream provider").
pub async fn send_sms(
    State(state): State<AppState>,
    Json(req): Json<SendSmsRequest>,
) -> Result<Json<SendSmsResponse>, ApiError> {
    let mut text = req.message.clone();

    if let Some(country) = state.country_for(&req.to).await {
        let configs = state.compliance_config.read().await;
        if let Some(country_config) = configs.get(&country) {
            let result = state.compliance_gate.check(&req.to, &text, country_config);
            if !result.allowed {
                return Err(ApiError::BlockedByPolicy(
                    result.reason.unwrap_or_else(|| "blocked by compliance policy".to_string()),
                ));
            }
            text = result.modified_text;
        }
    }

    let router = state.router.read().await.clone();
    let opts = SendOptions {
        from: req.from.clone(),
        media_url: None,
    };
    let outcome = router.send_message(&req.to, &text, &opts).await?;

    Ok(Json(SendSmsResponse {
        success: true,
        message_id: outcome.message_id,
        chat_id: format!("sms_{}", sanitize_for_chat_id(&req.to)),
        provider: outcome.provider_id,
        modem_id: None,
    }))
}

fn sanitize_for_chat_id(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// `POST /voip/answer`.
pub async fn answer_call(
    State(state): State<AppState>,
    Json(req): Json<AnswerCallRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let extension = req
        .extension
        .ok_or_else(|| ApiError::InvalidInput("extension is required".to_string()))?;
    state.call_tracker.answer_call(&req.call_id, &extension).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// `POST /voip/reject`.
pub async fn reject_call(
    State(state): State<AppState>,
    Json(req): Json<RejectCallRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.call_tracker.reject_call(&req.call_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// `GET /voip/ringing`.
pub async fn ringing_calls(State(state): State<AppState>) -> Json<RingingCallsResponse> {
    let rows = state.call_tracker.get_ringing_calls().await;
    let calls = rows
        .into_iter()
        .map(|row| {
            let mut extensions: Vec<String> = row.extensions_ringing.into_iter().collect();
            extensions.sort();
            RingingCallDto {
                call_id: row.call_id,
                caller_number: row.display_number,
                caller_name: row.display_name,
                line_name: row.line_name,
                extension: extensions.first().cloned(),
                channel: row.channel,
                start_time: row.first_notified_at,
                direction: "incoming".to_string(),
                status: "ringing".to_string(),
                extensions_ringing: extensions,
            }
        })
        .collect();
    Json(RingingCallsResponse { calls })
}

/// `POST /voip/originate`.
pub async fn originate(
    State(state): State<AppState>,
    Json(req): Json<OriginateRequest>,
) -> Result<Json<OriginateResponse>, ApiError> {
    let from_extension = req
        .from
        .clone()
        .or_else(|| req.channel.clone())
        .ok_or_else(|| ApiError::InvalidInput("from/channel is required".to_string()))?;
    let to_number = req
        .destination
        .clone()
        .or_else(|| req.exten.clone())
        .ok_or_else(|| ApiError::InvalidInput("destination/exten is required".to_string()))?;

    let mut options = HashMap::new();
    if let Some(caller_id) = &req.caller_id {
        options.insert("CallerID".to_string(), caller_id.clone());
    }
    if let Some(timeout) = req.timeout {
        options.insert("Timeout".to_string(), timeout.to_string());
    }

    let call_id = state.call_tracker.originate(&from_extension, &to_number, options).await?;
    Ok(Json(OriginateResponse { success: true, call_id }))
}

/// `GET /providers/status`.
pub async fn providers_status(State(state): State<AppState>) -> Json<ProvidersStatusResponse> {
    let providers = state
        .registry
        .list()
        .into_iter()
        .map(|info| ProviderStatusDto {
            name: info.id,
            provider_type: info.provider_type,
            connected: info.health.healthy,
            phone: info.config.get("phone").and_then(|v| v.as_str()).map(str::to_string),
        })
        .collect();
    Json(ProvidersStatusResponse {
        providers,
        timestamp: chrono::Utc::now().timestamp(),
    })
}

/// `GET /setup/status`.
pub async fn setup_status(State(state): State<AppState>) -> Result<Json<SetupStatusResponse>, ApiError> {
    let admin_password_changed = state
        .store
        .settings
        .get("admin_password_changed")
        .await?
        .map(|setting| setting.value == serde_json::json!(true))
        .unwrap_or(false);

    let setup_needed = !admin_password_changed;
    Ok(Json(SetupStatusResponse {
        setup_needed,
        current_step: if setup_needed { "admin_password".to_string() } else { "complete".to_string() },
        admin_password_changed,
        steps: vec![SetupStepDto {
            id: "admin_password".to_string(),
            complete: admin_password_changed,
        }],
    }))
}

/// `GET /events`: the long-lived subscriber stream transport for C2
/// (§4.2's "long-lived event streams to connected clients"). Realised as a
/// websocket, matching the teacher's `services/signaling` pattern, since
/// axum's `ws` feature is already in the dependency stack.
pub async fn events(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_event_socket(socket, state))
}

async fn handle_event_socket(mut socket: WebSocket, state: AppState) {
    let subscription = state.push.bus.subscribe(None).await;
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
    state.push.bus.unsubscribe(subscription.id).await;
}
