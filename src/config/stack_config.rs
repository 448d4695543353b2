use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

/// Which country source the short-code classifier consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PremiumRule {
    /// SIM country only.
    Sim,
    /// Serving network country only.
    Network,
    /// Both, merged to the more severe category.
    Both,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Maximum number of delayed re-submissions for one tracked unit.
    pub max_send_retries: u32,
    /// Delay before a re-submission after a transient radio failure.
    pub send_retry_delay_ms: u64,
    /// Maximum number of send batches parked awaiting user confirmation.
    /// One batch (single- or multi-part) counts once.
    pub mo_queue_limit: usize,
    /// How long to wait for a carrier messaging service result before
    /// falling back to the radio path.
    pub carrier_timeout_ms: u64,
    pub premium_rule: PremiumRule,
    /// Device is capable of sending short messages at all.
    pub sms_capable: bool,
    /// Outbound sending administratively disabled for this subscription.
    pub sms_send_disabled: bool,
    /// TP-MR numbering is owned by this stack. When false the radio side
    /// numbers submissions and `next()` hands out the 0 sentinel.
    pub message_ref_via_framework: bool,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            max_send_retries: 3,
            send_retry_delay_ms: 2_000,
            mo_queue_limit: 5,
            carrier_timeout_ms: 10 * 60 * 1000,
            premium_rule: PremiumRule::Sim,
            sms_capable: true,
            sms_send_disabled: false,
            message_ref_via_framework: true,
        }
    }
}

pub type SharedConfig = Arc<StackConfig>;

pub fn shared(config: StackConfig) -> SharedConfig {
    Arc::new(config)
}

/// Load a config from a TOML file. Missing keys take their defaults.
pub fn load_toml(path: &Path) -> anyhow::Result<StackConfig> {
    let raw = std::fs::read_to_string(path)?;
    let config: StackConfig = toml::from_str(&raw)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_policy() {
        let c = StackConfig::default();
        assert_eq!(c.max_send_retries, 3);
        assert_eq!(c.send_retry_delay_ms, 2_000);
        assert_eq!(c.mo_queue_limit, 5);
        assert_eq!(c.carrier_timeout_ms, 600_000);
        assert_eq!(c.premium_rule, PremiumRule::Sim);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c: StackConfig = toml::from_str(
            "max_send_retries = 5\npremium_rule = \"both\"\n",
        )
        .unwrap();
        assert_eq!(c.max_send_retries, 5);
        assert_eq!(c.premium_rule, PremiumRule::Both);
        assert_eq!(c.mo_queue_limit, 5);
    }
}
