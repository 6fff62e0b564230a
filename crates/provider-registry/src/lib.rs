//! C6: the provider registry. Loads configured WhatsApp/SMS/VoIP backends
//! as polymorphic `Provider` instances keyed by id, and hot-reloads them
//! when config changes without a restart (§4.6).

mod config;
mod error;
mod mock;
mod provider;
mod registry;

pub use config::ProviderConfigEntry;
pub use error::{ProviderError, Result};
pub use mock::MockProvider;
pub use provider::{Provider, SendOptions, SendOutcome};
pub use registry::{ProviderFactory, ProviderRegistry};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use models::{ProviderCapabilities, ProviderCapability, ProviderKind};

    use super::*;

    fn entry(id: &str, provider_type: &str, enabled: bool) -> ProviderConfigEntry {
        ProviderConfigEntry {
            id: id.to_string(),
            category: ProviderKind::Sms,
            provider_type: provider_type.to_string(),
            enabled,
            config: Default::default(),
        }
    }

    fn register_mock_factory(registry: &ProviderRegistry) {
        registry.register_factory(
            "mock",
            Arc::new(|entry: &ProviderConfigEntry| {
                Ok(Arc::new(MockProvider::new(
                    entry.id.clone(),
                    "mock",
                    ProviderCapabilities::none().with(ProviderCapability::SendText),
                )) as Arc<dyn Provider>)
            }),
        );
    }

    #[tokio::test]
    async fn load_initializes_enabled_providers() {
        let registry = ProviderRegistry::new();
        register_mock_factory(&registry);

        registry.load(&[entry("p1", "mock", true)]).await;

        assert!(registry.get("p1").is_some());
        assert!(registry.is_healthy("p1"));
        assert_eq!(registry.list().len(), 1);
    }

    #[tokio::test]
    async fn disabling_a_provider_disconnects_it() {
        let registry = ProviderRegistry::new();
        register_mock_factory(&registry);

        registry.load(&[entry("p1", "mock", true)]).await;
        assert!(registry.get("p1").is_some());

        registry.load(&[entry("p1", "mock", false)]).await;
        assert!(registry.get("p1").is_none());
        assert!(!registry.is_healthy("p1"));
    }

    #[tokio::test]
    async fn removing_an_entry_disconnects_it() {
        let registry = ProviderRegistry::new();
        register_mock_factory(&registry);

        registry.load(&[entry("p1", "mock", true), entry("p2", "mock", true)]).await;
        assert_eq!(registry.list().len(), 2);

        registry.load(&[entry("p2", "mock", true)]).await;
        assert!(registry.get("p1").is_none());
        assert!(registry.get("p2").is_some());
    }

    #[tokio::test]
    async fn unknown_provider_type_is_unhealthy_not_fatal() {
        let registry = ProviderRegistry::new();
        registry.load(&[entry("p1", "ghost", true)]).await;

        assert!(registry.get("p1").is_none());
        assert!(!registry.is_healthy("p1"));
        assert_eq!(registry.list().len(), 1);
    }

    #[tokio::test]
    async fn three_consecutive_failures_marks_unhealthy() {
        let registry = ProviderRegistry::new();
        register_mock_factory(&registry);
        registry.load(&[entry("p1", "mock", true)]).await;

        registry.mark_failure("p1", "timeout");
        assert!(registry.is_healthy("p1"));
        registry.mark_failure("p1", "timeout");
        assert!(registry.is_healthy("p1"));
        registry.mark_failure("p1", "timeout");
        assert!(!registry.is_healthy("p1"));

        registry.mark_success("p1");
        assert!(registry.is_healthy("p1"));
    }
}
