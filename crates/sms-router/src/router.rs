use std::sync::Arc;
use std::time::{Duration, Instant};

use dto::PushEvent;
use provider_registry::{ProviderRegistry, SendOptions};
use push_bus::PushFanout;
use store::Store;

use crate::error::{Result, RouterError};
use crate::rule::RoutingRule;

#[derive(Debug, Clone)]
pub struct RoutedOutcome {
    pub provider_id: String,
    pub message_id: String,
    pub elapsed: Duration,
}

/// C7: selects a provider per §4.7's ordered routing rules, then sends
/// with fallback-chain retry and health bookkeeping.
pub struct SmsRouter {
    registry: Arc<ProviderRegistry>,
    push: Arc<PushFanout>,
    store: Store,
    recipients: Vec<i64>,
    rules: Vec<RoutingRule>,
    static_fallback_chain: Vec<String>,
}

impl SmsRouter {
    pub fn new(registry: Arc<ProviderRegistry>, push: Arc<PushFanout>, store: Store, recipients: Vec<i64>) -> Self {
        Self {
            registry,
            push,
            store,
            recipients,
            rules: Vec::new(),
            static_fallback_chain: Vec::new(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<RoutingRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_static_fallback_chain(mut self, chain: Vec<String>) -> Self {
        self.static_fallback_chain = chain;
        self
    }

    /// Picks the provider that would currently be used for `destination`,
    /// without sending anything. Exposed for `/providers/status`-style
    /// introspection and for tests that assert the routing decision itself.
    pub fn select_provider(&self, destination: &str) -> Option<String> {
        self.candidate_chain(destination)
            .into_iter()
            .find(|id| self.registry.is_healthy(id))
    }

    fn candidate_chain(&self, destination: &str) -> Vec<String> {
        let mut rules = self.rules.clone();
        rules.sort_by_key(|r| r.priority);

        let mut chain = Vec::new();
        if let Some(rule) = rules.iter().find(|r| r.matches(destination)) {
            chain.push(rule.provider_id.clone());
            if let Some(fallback) = &rule.fallback_provider_id {
                chain.push(fallback.clone());
            }
        }
        for id in &self.static_fallback_chain {
            if !chain.contains(id) {
                chain.push(id.clone());
            }
        }
        chain
    }

    /// §4.7 send algorithm. Selection re-runs on every call, so a provider
    /// that crossed the three-consecutive-failures threshold on a prior
    /// send is skipped by this call's selection (invariant 5) rather than
    /// retried in-line — a failure here is reported to the caller, who is
    /// free to call again, at which point selection has already moved on
    /// to the fallback.
    pub async fn send_message(&self, to: &str, text: &str, opts: &SendOptions) -> Result<RoutedOutcome> {
        let Some(provider_id) = self.select_provider(to) else {
            return Err(RouterError::NoProvider(to.to_string()));
        };

        let Some(provider) = self.registry.get(&provider_id) else {
            return Err(RouterError::NoProvider(to.to_string()));
        };

        let start = Instant::now();
        match provider.send_message(to, text, opts).await {
            Ok(outcome) => {
                self.registry.mark_success(&provider_id);
                Ok(RoutedOutcome {
                    provider_id,
                    message_id: outcome.message_id,
                    elapsed: start.elapsed(),
                })
            }
            Err(err) => {
                self.registry.mark_failure(&provider_id, &err.to_string());
                if !self.registry.is_healthy(&provider_id) {
                    self.push
                        .publish(
                            &self.store,
                            &self.recipients,
                            PushEvent::ProviderStatusChanged {
                                provider_id: provider_id.clone(),
                                healthy: false,
                            },
                        )
                        .await;
                    tracing::warn!(provider_id = %provider_id, "provider marked unhealthy after repeated failures");
                }
                Err(RouterError::Provider(err))
            }
        }
    }

    /// Periodic (60s, per §4.7) health-check worker: reconciles `healthy`
    /// against a live `get_status` call and emits `provider_recovered` on
    /// every unhealthy-to-healthy transition. Intended to run as a spawned
    /// task for the lifetime of the gateway process.
    pub async fn run_health_check_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.health_check_once().await;
        }
    }

    pub async fn health_check_once(&self) {
        let recovered = self.registry.health_check_all().await;
        for provider_id in recovered {
            self.push
                .publish(
                    &self.store,
                    &self.recipients,
                    PushEvent::ProviderStatusChanged { provider_id, healthy: true },
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use models::{ProviderCapabilities, ProviderKind};
    use provider_registry::{MockProvider, Provider};
    use sqlx::SqlitePool;

    use super::*;

    async fn test_store() -> Store {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::migrate!("../store/migrations").run(&pool).await.unwrap();
        Store::from_pool(pool)
    }

    async fn registry_with(providers: Vec<(&str, bool)>) -> Arc<ProviderRegistry> {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register_factory(
            "mock",
            Arc::new(|entry: &provider_registry::ProviderConfigEntry| {
                Ok(Arc::new(MockProvider::new(entry.id.clone(), "mock", ProviderCapabilities::none())) as Arc<dyn Provider>)
            }),
        );
        let entries: Vec<_> = providers
            .iter()
            .map(|(id, _)| provider_registry::ProviderConfigEntry {
                id: id.to_string(),
                category: ProviderKind::Sms,
                provider_type: "mock".to_string(),
                enabled: true,
                config: Default::default(),
            })
            .collect();
        registry.load(&entries).await;
        for (id, healthy) in providers {
            registry.set_healthy(id, healthy);
        }
        registry
    }

    #[tokio::test]
    async fn scenario_3_fallback_after_three_failures() {
        let registry = Arc::new(ProviderRegistry::new());
        registry.register_factory(
            "mock",
            Arc::new(|entry: &provider_registry::ProviderConfigEntry| {
                let failing = entry.id == "P_fr";
                let mut p = MockProvider::new(entry.id.clone(), "mock", ProviderCapabilities::none());
                if failing {
                    p = p.failing();
                }
                Ok(Arc::new(p) as Arc<dyn Provider>)
            }),
        );
        registry
            .load(&[
                provider_registry::ProviderConfigEntry {
                    id: "P_fr".to_string(),
                    category: ProviderKind::Sms,
                    provider_type: "mock".to_string(),
                    enabled: true,
                    config: Default::default(),
                },
                provider_registry::ProviderConfigEntry {
                    id: "P_intl".to_string(),
                    category: ProviderKind::Sms,
                    provider_type: "mock".to_string(),
                    enabled: true,
                    config: Default::default(),
                },
            ])
            .await;

        let push = Arc::new(PushFanout::new(8));
        let router = Arc::new(
            SmsRouter::new(registry.clone(), push, test_store().await, vec![])
                .with_rules(vec![RoutingRule::country_prefix(10, "+33", "P_fr", "P_intl")]),
        );

        for _ in 0..3 {
            let err = router.send_message("+33612345678", "hi", &SendOptions::default()).await;
            assert!(err.is_err());
        }
        assert!(!registry.is_healthy("P_fr"));

        let outcome = router
            .send_message("+33612345678", "hi", &SendOptions::default())
            .await
            .expect("fourth attempt should succeed via fallback");
        assert_eq!(outcome.provider_id, "P_intl");
    }

    #[tokio::test]
    async fn no_provider_when_all_unhealthy() {
        let registry = registry_with(vec![("P_fr", false), ("P_intl", false)]).await;
        let push = Arc::new(PushFanout::new(8));
        let router = SmsRouter::new(registry, push, test_store().await, vec![])
            .with_rules(vec![RoutingRule::country_prefix(10, "+33", "P_fr", "P_intl")]);

        let err = router.send_message("+33612345678", "hi", &SendOptions::default()).await;
        assert!(matches!(err, Err(RouterError::NoProvider(_))));
    }

    #[tokio::test]
    async fn id_prefix_rule_has_no_fallback() {
        let registry = registry_with(vec![("bridge", true)]).await;
        let push = Arc::new(PushFanout::new(8));
        let router =
            SmsRouter::new(registry, push, test_store().await, vec![]).with_rules(vec![RoutingRule::id_prefix(5, "sms_", "bridge")]);

        assert_eq!(router.select_provider("sms_internal_123"), Some("bridge".to_string()));
    }

    #[tokio::test]
    async fn health_check_loop_emits_recovered_event() {
        // MockProvider starts out healthy internally; marking the registry's
        // cached status unhealthy first lets us observe the transition a
        // live `get_status` reconciliation would produce on real recovery.
        let registry = registry_with(vec![("P1", true)]).await;
        registry.set_healthy("P1", false);
        let push = Arc::new(PushFanout::new(8));
        let sub = push.bus.subscribe(None).await;
        let router = SmsRouter::new(registry, push, test_store().await, vec![]);

        router.health_check_once().await;
        let event = sub.recv().await;
        assert!(matches!(event, Some(PushEvent::ProviderStatusChanged { healthy: true, .. })));
    }
}
