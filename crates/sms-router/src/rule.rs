use regex::Regex;

/// One routing rule, evaluated in ascending `priority` order (§4.7). The
/// first three kinds are the fixed built-ins; `Custom` entries come from
/// configuration so operators can add country/bridge rules without a
/// rebuild (§9's "custom rules injected from configuration").
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Destination ids routed straight to a bridge provider, no fallback
    /// (e.g. internal `sms_*` ids).
    IdPrefix { prefix: String },
    /// E.164 country-code prefix (e.g. `+33`) with a preferred provider and
    /// a secondary fallback.
    CountryPrefix { prefix: String },
    /// Anything starting with `+` but not matching a more specific rule.
    InternationalFallback,
    /// Operator-supplied regex rule with an explicit priority.
    Custom { pattern: Regex },
}

#[derive(Debug, Clone)]
pub struct RoutingRule {
    pub priority: i32,
    pub kind: RuleKind,
    pub provider_id: String,
    pub fallback_provider_id: Option<String>,
}

impl RoutingRule {
    pub fn id_prefix(priority: i32, prefix: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            priority,
            kind: RuleKind::IdPrefix { prefix: prefix.into() },
            provider_id: provider_id.into(),
            fallback_provider_id: None,
        }
    }

    pub fn country_prefix(
        priority: i32,
        prefix: impl Into<String>,
        provider_id: impl Into<String>,
        fallback_provider_id: impl Into<String>,
    ) -> Self {
        Self {
            priority,
            kind: RuleKind::CountryPrefix { prefix: prefix.into() },
            provider_id: provider_id.into(),
            fallback_provider_id: Some(fallback_provider_id.into()),
        }
    }

    pub fn international_fallback(priority: i32, provider_id: impl Into<String>) -> Self {
        Self {
            priority,
            kind: RuleKind::InternationalFallback,
            provider_id: provider_id.into(),
            fallback_provider_id: None,
        }
    }

    pub fn custom(
        priority: i32,
        pattern: Regex,
        provider_id: impl Into<String>,
        fallback_provider_id: Option<String>,
    ) -> Self {
        Self {
            priority,
            kind: RuleKind::Custom { pattern },
            provider_id: provider_id.into(),
            fallback_provider_id,
        }
    }

    pub fn matches(&self, destination: &str) -> bool {
        match &self.kind {
            RuleKind::IdPrefix { prefix } => destination.starts_with(prefix.as_str()),
            RuleKind::CountryPrefix { prefix } => destination.starts_with(prefix.as_str()),
            RuleKind::InternationalFallback => destination.starts_with('+'),
            RuleKind::Custom { pattern } => pattern.is_match(destination),
        }
    }
}
