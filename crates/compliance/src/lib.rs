//! C10: pre-send SMS compliance checks — time window, blocked days, STOP
//! clause, anti-spam delay, and length warnings, per country (§4.10).

mod config;
mod gate;
mod segmentation;

pub use config::{CountryCompliance, TimeRestrictions};
pub use gate::{CheckResult, ComplianceGate};
pub use segmentation::segment_count;
