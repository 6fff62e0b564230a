//! C7: routes outbound SMS across providers by prefix rules, with health
//! tracking, consecutive-failure back-off and a fallback chain (§4.7).

mod config;
mod error;
mod router;
mod rule;

pub use config::{parse_rules, RoutingRuleConfig, RuleConfigError};
pub use error::{Result, RouterError};
pub use router::{RoutedOutcome, SmsRouter};
pub use rule::{RoutingRule, RuleKind};
