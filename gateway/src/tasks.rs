//! Background task spawning (§5): one task per long-running component, plus
//! the config hot-reload poller. Mirrors the teacher's `main.rs` pattern of
//! spawning a handful of loops against a shared `watch::Sender<bool>`
//! shutdown signal rather than a supervisor crate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use call_tracker::CallTracker;
use pbx_mi::PbxMiClient;
use sms_router::SmsRouter;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{self, GatewayConfig};
use crate::state::AppState;

pub struct TaskHandles {
    handles: Vec<JoinHandle<()>>,
}

impl TaskHandles {
    /// Aborts every background task. Called after the shutdown signal has
    /// had a chance to let loops exit cleanly, as a backstop for the ones
    /// (health-check loop, reflector loop) that have no shutdown receiver.
    pub fn abort_all(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Spawns the PBX-MI connection loop, the call tracker's event consumer,
/// the SMS router's health-check loop, one chat-reflector loop per
/// configured source, and the config hot-reload poller.
pub async fn spawn_all(
    state: AppState,
    pbx: Arc<PbxMiClient>,
    call_tracker: Arc<CallTracker>,
    config_path: PathBuf,
    shutdown_rx: watch::Receiver<bool>,
) -> TaskHandles {
    let mut handles = Vec::new();

    handles.push(tokio::spawn(pbx.run(shutdown_rx.clone())));
    handles.push(tokio::spawn(call_tracker.run(shutdown_rx.clone())));

    {
        let router = state.router.read().await.clone();
        handles.push(tokio::spawn(async move {
            router.run_health_check_loop(Duration::from_secs(60)).await;
        }));
    }

    for reflector in state.reflectors.read().await.values().cloned() {
        handles.push(tokio::spawn(async move {
            reflector.run_loop().await;
        }));
    }

    handles.push(tokio::spawn(reload_loop(state, config_path, shutdown_rx)));

    TaskHandles { handles }
}

async fn reload_loop(state: AppState, config_path: PathBuf, mut shutdown_rx: watch::Receiver<bool>) {
    let mut last_seen: Option<SystemTime> = config::mtime(&config_path);
    let mut interval = tokio::time::interval(Duration::from_secs(5));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return;
                }
                continue;
            }
        }

        let current = config::mtime(&config_path);
        if current == last_seen {
            continue;
        }
        last_seen = current;

        match config::load(&config_path) {
            Ok(new_config) => apply_reload(&state, new_config).await,
            Err(err) => tracing::warn!(error = %err, "config reload failed, keeping previous config"),
        }
    }
}

/// Applies a reloaded `gateway.toml`: provider registry entries are
/// diff-applied in place, the router is swapped whole, and the compliance
/// tables are replaced. Per §9's resolution of the hot-reload open question,
/// the call tracker's and reflectors' own startup-time config (trunk
/// classification tables, per-source sync tunables) is not live-reloadable
/// in this binary — only the provider/routing/compliance surface is.
async fn apply_reload(state: &AppState, new_config: GatewayConfig) {
    let entries = new_config.providers.into_entries();
    state.registry.load(&entries).await;

    let rules = match sms_router::parse_rules(new_config.routing.sms) {
        Ok(rules) => rules,
        Err(err) => {
            tracing::warn!(error = %err, "invalid routing rules in reloaded config, keeping previous rules");
            return;
        }
    };

    let new_router = Arc::new(
        SmsRouter::new(
            state.registry.clone(),
            state.push.clone(),
            state.store.clone(),
            new_config.recipients.clone(),
        )
        .with_rules(rules)
        .with_static_fallback_chain(new_config.routing.static_fallback_chain),
    );
    *state.router.write().await = new_router;

    *state.compliance_config.write().await = new_config.compliance.sms;
    *state.prefix_country_map.write().await = new_config.compliance.prefix_country_map;
    *state.recipients.write().await = new_config.recipients;

    tracing::info!("gateway config reloaded");
}
