use regex::Regex;
use serde::Deserialize;

use crate::rule::RoutingRule;

/// One `[[sms_router.rules]]` entry from the gateway config file. `kind`
/// selects which `RoutingRule` constructor applies; `pattern`/`prefix` are
/// interpreted according to it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingRuleConfig {
    IdPrefix {
        priority: i32,
        prefix: String,
        provider_id: String,
    },
    CountryPrefix {
        priority: i32,
        prefix: String,
        provider_id: String,
        fallback_provider_id: String,
    },
    InternationalFallback {
        priority: i32,
        provider_id: String,
    },
    Custom {
        priority: i32,
        pattern: String,
        provider_id: String,
        fallback_provider_id: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RuleConfigError {
    #[error("invalid regex in custom routing rule: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl RoutingRuleConfig {
    pub fn into_rule(self) -> Result<RoutingRule, RuleConfigError> {
        Ok(match self {
            RoutingRuleConfig::IdPrefix { priority, prefix, provider_id } => {
                RoutingRule::id_prefix(priority, prefix, provider_id)
            }
            RoutingRuleConfig::CountryPrefix {
                priority,
                prefix,
                provider_id,
                fallback_provider_id,
            } => RoutingRule::country_prefix(priority, prefix, provider_id, fallback_provider_id),
            RoutingRuleConfig::InternationalFallback { priority, provider_id } => {
                RoutingRule::international_fallback(priority, provider_id)
            }
            RoutingRuleConfig::Custom {
                priority,
                pattern,
                provider_id,
                fallback_provider_id,
            } => RoutingRule::custom(priority, Regex::new(&pattern)?, provider_id, fallback_provider_id),
        })
    }
}

/// Parses a full rule set, failing on the first invalid regex.
pub fn parse_rules(entries: Vec<RoutingRuleConfig>) -> Result<Vec<RoutingRule>, RuleConfigError> {
    entries.into_iter().map(RoutingRuleConfig::into_rule).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_rule_kinds_from_toml() {
        let toml = r#"
            [[rule]]
            kind = "country_prefix"
            priority = 10
            prefix = "+33"
            provider_id = "P_fr"
            fallback_provider_id = "P_intl"

            [[rule]]
            kind = "custom"
            priority = 5
            pattern = "^sms_"
            provider_id = "bridge"
        "#;

        #[derive(Deserialize)]
        struct Wrapper {
            rule: Vec<RoutingRuleConfig>,
        }

        let wrapper: Wrapper = toml::from_str(toml).unwrap();
        let rules = parse_rules(wrapper.rule).unwrap();
        assert_eq!(rules.len(), 2);
    }
}
