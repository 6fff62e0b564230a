use std::collections::HashMap;
use std::sync::Arc;

use dto::PushEvent;
use models::{CallDirection, CallStatus, RingingCall};
use pbx_mi::{Frame, PbxMiClient};
use push_bus::PushFanout;
use store::Store;
use tokio::sync::{watch, Mutex};

use crate::cdr::derive_call;
use crate::classify::{classify_channel, classify_direction, ChannelClass};
use crate::config::CallTrackerConfig;
use crate::error::{CallTrackerError, Result};
use crate::event::PbxEvent;
use crate::ringing::RingingRegistry;

struct ChannelState {
    linked_id: String,
    direction: CallDirection,
    class: ChannelClass,
    caller_id_num: String,
    caller_id_name: Option<String>,
}

#[derive(Default)]
struct TrackerState {
    channels: HashMap<String, ChannelState>,
    ringing: RingingRegistry,
    /// The trunk-class channel to redirect on answer, keyed by linked-id.
    answer_channel: HashMap<String, String>,
}

/// C4: consumes the PBX-MI event stream and maintains per-channel state,
/// the ringing-call set, and authoritative call rows written from CDRs.
pub struct CallTracker {
    pbx: Arc<PbxMiClient>,
    push: Arc<PushFanout>,
    store: Store,
    config: CallTrackerConfig,
    /// Every registered device belongs to the one shared team inbox; see
    /// `push-bus`'s fan-out rationale.
    recipients: Vec<i64>,
    state: Mutex<TrackerState>,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl CallTracker {
    pub fn new(
        pbx: Arc<PbxMiClient>,
        push: Arc<PushFanout>,
        store: Store,
        config: CallTrackerConfig,
        recipients: Vec<i64>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pbx,
            push,
            store,
            config,
            recipients,
            state: Mutex::new(TrackerState::default()),
        })
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.pbx.subscribe_events();
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(frame) => self.handle_frame(&frame).await,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "call-tracker lagged behind pbx-mi event stream");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = self.watchdog_tick() => {
                    self.sweep_stale_ringing().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn watchdog_tick(&self) {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }

    async fn sweep_stale_ringing(&self) {
        let stale = {
            let state = self.state.lock().await;
            state.ringing.stale(now(), self.config.ringing_watchdog_secs)
        };
        for call_id in stale {
            let mut state = self.state.lock().await;
            if state.ringing.close(&call_id).is_some() {
                drop(state);
                tracing::warn!(%call_id, "ringing row force-closed by watchdog");
                self.push
                    .publish(
                        &self.store,
                        &self.recipients,
                        PushEvent::CallEnded {
                            call_id,
                            status: "missed".to_string(),
                        },
                    )
                    .await;
            }
        }
    }

    pub(crate) async fn handle_frame(&self, frame: &Frame) {
        match PbxEvent::from_frame(frame) {
            PbxEvent::Newchannel { channel, caller_id_num, caller_id_name, context, linked_id, exten } => {
                self.on_newchannel(channel, caller_id_num, caller_id_name, context, linked_id, exten).await;
            }
            PbxEvent::DialBegin { channel, dest_channel, linked_id } => {
                self.on_dial_begin(channel, dest_channel, linked_id).await;
            }
            PbxEvent::DialEnd { dest_channel, dial_status, linked_id } => {
                self.on_dial_end(dest_channel, dial_status, linked_id).await;
            }
            PbxEvent::Bridge { channel1, channel2, linked_id } => {
                self.on_bridge(channel1, channel2, linked_id).await;
            }
            PbxEvent::Hangup { channel, linked_id, cause } => {
                self.on_hangup(channel, linked_id, cause).await;
            }
            PbxEvent::Cdr { .. } => {
                self.on_cdr(PbxEvent::from_frame(frame)).await;
            }
            PbxEvent::Other => {}
        }
    }

    async fn on_newchannel(
        &self,
        channel: String,
        caller_id_num: String,
        caller_id_name: Option<String>,
        context: String,
        linked_id: String,
        exten: Option<String>,
    ) {
        let Some(class) = classify_channel(&channel, &caller_id_num, caller_id_name.as_deref(), exten.as_deref(), &self.config) else {
            return;
        };
        let direction = classify_direction(&context, &caller_id_num, &self.config);
        let mut state = self.state.lock().await;
        state.channels.insert(
            channel.clone(),
            ChannelState { linked_id, direction, class, caller_id_num, caller_id_name },
        );
    }

    async fn on_dial_begin(&self, channel: String, dest_channel: String, linked_id: String) {
        // Only extension-class destinations matter for the ringing path.
        let extension = {
            let state = self.state.lock().await;
            match state.channels.get(&dest_channel) {
                Some(ChannelState { class: ChannelClass::Extension { extension }, .. }) => Some(extension.clone()),
                _ => None,
            }
        };
        let Some(extension) = extension else { return };

        let origin = {
            let state = self.state.lock().await;
            state.channels.get(&channel).map(|cs| {
                let line_name = match &cs.class {
                    ChannelClass::Trunk { line_name } => line_name.clone(),
                    _ => None,
                };
                let is_incoming = matches!(cs.class, ChannelClass::Trunk { .. }) || cs.direction == CallDirection::Incoming;
                (is_incoming, cs.caller_id_num.clone(), cs.caller_id_name.clone(), line_name)
            })
        };
        let Some((true, caller_number, caller_name, line_name)) = origin else {
            return;
        };

        let mut state = self.state.lock().await;
        state.answer_channel.entry(linked_id.clone()).or_insert_with(|| channel.clone());

        let ts = now();
        let linked_id_for_row = linked_id.clone();
        let (first_seen, row) = state.ringing.open_or_touch(move || RingingCall {
            call_id: linked_id_for_row,
            display_number: caller_number,
            display_name: caller_name,
            line_name,
            extensions_ringing: Default::default(),
            channel: channel.clone(),
            first_notified_at: ts,
        });
        row.extensions_ringing.insert(extension.clone());
        let snapshot = row.clone();
        drop(state);

        if first_seen {
            self.push
                .publish(
                    &self.store,
                    &self.recipients,
                    PushEvent::IncomingCall {
                        call_id: snapshot.call_id,
                        caller_number: snapshot.display_number,
                        caller_name: snapshot.display_name,
                        line_name: snapshot.line_name,
                        extension: Some(extension),
                    },
                )
                .await;
        }
    }

    async fn on_dial_end(&self, _dest_channel: String, dial_status: String, linked_id: String) {
        let status = match dial_status.to_ascii_uppercase().as_str() {
            "ANSWER" => Some("answered"),
            "BUSY" => Some("busy"),
            "NOANSWER" => Some("missed"),
            "CANCEL" => Some("missed"),
            "CONGESTION" => Some("failed"),
            _ => None,
        };
        let Some(status) = status else { return };
        if status != "answered" {
            let closed = {
                let mut state = self.state.lock().await;
                state.ringing.close(&linked_id).is_some()
            };
            if closed {
                self.push
                    .publish(
                        &self.store,
                        &self.recipients,
                        PushEvent::CallEnded { call_id: linked_id, status: status.to_string() },
                    )
                    .await;
            }
        }
    }

    async fn on_bridge(&self, _channel1: String, _channel2: String, linked_id: String) {
        let closed = {
            let mut state = self.state.lock().await;
            state.ringing.close(&linked_id).is_some()
        };
        if closed {
            self.push
                .publish(
                    &self.store,
                    &self.recipients,
                    PushEvent::CallEnded { call_id: linked_id, status: "answered".to_string() },
                )
                .await;
        }
    }

    async fn on_hangup(&self, channel: String, _linked_id: String, _cause: Option<String>) {
        let mut state = self.state.lock().await;
        state.channels.remove(&channel);
        // The CDR is the source of truth for the persisted row; nothing
        // written to the store here.
    }

    async fn on_cdr(&self, event: PbxEvent) {
        let Some(call) = derive_call(&event, &self.config) else {
            return;
        };
        let inserted = match self.store.calls.insert_if_new(&call).await {
            Ok(inserted) => inserted,
            Err(err) => {
                tracing::error!(error = %err, call_id = %call.id, "failed to persist call row");
                return;
            }
        };
        if !inserted {
            return;
        }

        self.push
            .publish(
                &self.store,
                &self.recipients,
                PushEvent::CallHistoryUpdate { call_id: call.id.clone() },
            )
            .await;

        if call.status == CallStatus::Missed {
            self.push
                .publish(
                    &self.store,
                    &self.recipients,
                    PushEvent::MissedCall {
                        call_id: call.id.clone(),
                        caller_number: call.caller_number.clone(),
                    },
                )
                .await;
        }
    }

    /// Locates a suitable trunk/ingress channel and redirects it into the
    /// internal extension context, per §4.4's `answer_call` contract.
    pub async fn answer_call(&self, call_id: &str, target_extension: &str) -> Result<()> {
        if !self.pbx.is_authenticated() {
            return Err(CallTrackerError::Unavailable);
        }
        let channel = {
            let state = self.state.lock().await;
            state
                .answer_channel
                .get(call_id)
                .cloned()
                .or_else(|| state.ringing.get(call_id).map(|row| row.channel.clone()))
        };
        let Some(channel) = channel else {
            return Err(CallTrackerError::ChannelNotFound);
        };

        self.pbx.redirect(&channel, target_extension, "from-internal").await?;
        Ok(())
    }

    /// Hangs up every channel linked to the call and closes its ringing row
    /// with `rejected`.
    pub async fn reject_call(&self, call_id: &str) -> Result<()> {
        let channels: Vec<String> = {
            let state = self.state.lock().await;
            state
                .channels
                .iter()
                .filter(|(_, cs)| cs.linked_id == call_id)
                .map(|(channel, _)| channel.clone())
                .collect()
        };
        for channel in &channels {
            let _ = self.pbx.hangup(channel, "rejected").await;
        }
        let closed = {
            let mut state = self.state.lock().await;
            state.ringing.close(call_id).is_some()
        };
        if closed {
            self.push
                .publish(
                    &self.store,
                    &self.recipients,
                    PushEvent::CallEnded { call_id: call_id.to_string(), status: "rejected".to_string() },
                )
                .await;
        }
        Ok(())
    }

    pub async fn get_ringing_calls(&self) -> Vec<RingingCall> {
        self.state.lock().await.ringing.all()
    }

    /// Constructs and submits an `Originate` action, surfacing the PBX
    /// acknowledgement to the caller.
    pub async fn originate(&self, from_extension: &str, to_number: &str, options: HashMap<String, String>) -> Result<String> {
        let mut params = options;
        params.insert("Channel".to_string(), format!("PJSIP/{from_extension}"));
        params.insert("Exten".to_string(), to_number.to_string());
        params.insert("Context".to_string(), "from-internal".to_string());
        params.insert("Priority".to_string(), "1".to_string());
        let response = self.pbx.originate(params).await?;
        if response.is_success() {
            Ok(response.action_id().unwrap_or_default().to_string())
        } else {
            Err(CallTrackerError::OriginateRejected)
        }
    }
}
