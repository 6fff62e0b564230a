//! `gateway`: the single OS process (§5) wiring every component (C1-C10)
//! together behind one HTTP boundary, following the teacher's
//! single-binary-per-service `main.rs` shape generalised to one binary for
//! the whole deployment.

mod bridge_source;
mod config;
mod error;
mod routes;
mod state;
mod tasks;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use call_tracker::CallTracker;
use chat_reflector::ChatReflector;
use compliance::ComplianceGate;
use extension_provisioner::ExtensionProvisioner;
use media_cache::MediaUrlCache;
use models::{ProviderCapabilities, ProviderCapability};
use pbx_mi::PbxMiClient;
use provider_registry::{MockProvider, Provider, ProviderRegistry};
use push_bus::PushFanout;
use sms_router::SmsRouter;
use std::collections::HashMap;
use store::Store;
use tokio::sync::{watch, RwLock};
use tower_http::cors::CorsLayer;

use crate::bridge_source::HttpBridgeSource;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = config::default_path();
    let config = config::load_or_default(&config_path);

    let data_dir = config
        .data_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));
    let store = Store::open(&data_dir).await?;

    let pbx = PbxMiClient::new((&config.pbx_mi).into());
    let push = Arc::new(PushFanout::new(64));

    let provisioner = Arc::new(ExtensionProvisioner::new(pbx.clone(), store.clone(), config.provisioner.clone()));

    let registry = Arc::new(ProviderRegistry::new());
    registry.register_factory("mock", Arc::new(|entry: &provider_registry::ProviderConfigEntry| {
        let caps = ProviderCapabilities::none()
            .with(ProviderCapability::SendText)
            .with(ProviderCapability::Receive);
        let provider: Arc<dyn Provider> = Arc::new(MockProvider::new(entry.id.clone(), entry.provider_type.clone(), caps));
        Ok(provider)
    }));
    registry.load(&config.providers.clone().into_entries()).await;

    let rules = sms_router::parse_rules(config.routing.sms.clone())
        .map_err(|err| anyhow::anyhow!("invalid routing rule in {}: {err}", config_path.display()))?;
    let router = Arc::new(
        SmsRouter::new(registry.clone(), push.clone(), store.clone(), config.recipients.clone())
            .with_rules(rules)
            .with_static_fallback_chain(config.routing.static_fallback_chain.clone()),
    );

    let call_tracker = CallTracker::new(pbx.clone(), push.clone(), store.clone(), config.call_tracker.clone(), config.recipients.clone());

    let compliance_gate = Arc::new(ComplianceGate::new());
    let media_cache = Arc::new(MediaUrlCache::new());

    let mut reflectors = HashMap::new();
    for (provider_id, source_config) in &config.reflector.sources {
        let source = Arc::new(HttpBridgeSource::new(
            provider_id.clone(),
            source_config.chat_id_prefix.clone(),
            source_config.base_url.clone(),
        ));
        let reflector = Arc::new(ChatReflector::new(
            source,
            store.clone(),
            push.clone(),
            config.recipients.clone(),
            (&config.reflector).into(),
        ));
        reflectors.insert(provider_id.clone(), reflector);
    }

    let state = AppState {
        store: store.clone(),
        push: push.clone(),
        pbx: pbx.clone(),
        call_tracker: call_tracker.clone(),
        provisioner,
        registry,
        media_cache,
        compliance_gate,
        router: Arc::new(RwLock::new(router)),
        compliance_config: Arc::new(RwLock::new(config.compliance.sms.clone())),
        prefix_country_map: Arc::new(RwLock::new(config.compliance.prefix_country_map.clone())),
        reflectors: Arc::new(RwLock::new(reflectors)),
        recipients: Arc::new(RwLock::new(config.recipients.clone())),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task_handles = tasks::spawn_all(state.clone(), pbx, call_tracker, config_path, shutdown_rx).await;

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/sms/send", post(routes::send_sms))
        .route("/voip/answer", post(routes::answer_call))
        .route("/voip/reject", post(routes::reject_call))
        .route("/voip/ringing", get(routes::ringing_calls))
        .route("/voip/originate", post(routes::originate))
        .route("/providers/status", get(routes::providers_status))
        .route("/setup/status", get(routes::setup_status))
        .route("/events", get(routes::events))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let bind_addr = config.bind_addr.clone().unwrap_or_else(|| "0.0.0.0:8088".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    task_handles.abort_all();
    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
}
