//! # Engine Configuration
//!
//! Policy knobs for the transaction orchestrators.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`COMPTOIR_*`)
//! 2. Defaults (this file)
//!
//! ## Thread Safety
//! Configuration is read-only after initialization; processors hold a
//! clone each, so no locking is involved.

use serde::{Deserialize, Serialize};
use tracing::warn;

use comptoir_core::validation::validate_tax_rate_bps;
use comptoir_core::{StackingPolicy, TaxRate};

use crate::retry::RetryPolicy;

/// Engine configuration.
///
/// ## Fields
/// The defaults reproduce the observed behavior of the system: no tax,
/// every eligible promotion stacks, refunds reverse loyalty and
/// promotion counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Tax rate applied to the discounted base.
    /// Default: 0 bps (no tax)
    pub tax_rate: TaxRate,

    /// How multiple eligible promotions combine on one sale.
    /// Default: All (every eligible promotion applies)
    pub stacking_policy: StackingPolicy,

    /// Whether a refund that lands a sale in terminal `refunded` status
    /// reverses loyalty points and promotion usage counters.
    /// Default: true
    pub reverse_counters_on_refund: bool,

    /// Backoff settings for contended write transactions.
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    /// Returns the default engine configuration.
    ///
    /// ## Default Values
    /// - Tax: 0 bps
    /// - Stacking: all eligible promotions
    /// - Refund reversal: on
    /// - Retry: 5 attempts, 50ms base delay, 1s cap
    fn default() -> Self {
        EngineConfig {
            tax_rate: TaxRate::zero(),
            stacking_policy: StackingPolicy::All,
            reverse_counters_on_refund: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new EngineConfig from environment variables and defaults.
    ///
    /// ## Environment Variables
    /// - `COMPTOIR_TAX_RATE`: Tax rate as a percentage (e.g., "8.25")
    /// - `COMPTOIR_STACKING`: "all" or "best_only"
    /// - `COMPTOIR_REVERSE_ON_REFUND`: "true" or "false"
    /// - `COMPTOIR_RETRY_MAX_ATTEMPTS`: Total attempts before giving up
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = EngineConfig::default();

        if let Ok(rate_str) = std::env::var("COMPTOIR_TAX_RATE") {
            match rate_str.parse::<f64>() {
                Ok(rate) if validate_tax_rate_bps((rate * 100.0) as u32).is_ok() => {
                    config.tax_rate = TaxRate::from_percentage(rate);
                }
                _ => warn!(value = %rate_str, "Ignoring invalid COMPTOIR_TAX_RATE"),
            }
        }

        if let Ok(policy) = std::env::var("COMPTOIR_STACKING") {
            match policy.to_lowercase().as_str() {
                "all" => config.stacking_policy = StackingPolicy::All,
                "best_only" | "best" => config.stacking_policy = StackingPolicy::BestOnly,
                other => warn!(value = %other, "Ignoring unknown COMPTOIR_STACKING"),
            }
        }

        if let Ok(flag) = std::env::var("COMPTOIR_REVERSE_ON_REFUND") {
            match flag.to_lowercase().as_str() {
                "true" | "1" | "on" => config.reverse_counters_on_refund = true,
                "false" | "0" | "off" => config.reverse_counters_on_refund = false,
                other => warn!(value = %other, "Ignoring unknown COMPTOIR_REVERSE_ON_REFUND"),
            }
        }

        if let Ok(attempts) = std::env::var("COMPTOIR_RETRY_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) if n >= 1 => config.retry.max_attempts = n,
                _ => warn!(value = %attempts, "Ignoring invalid COMPTOIR_RETRY_MAX_ATTEMPTS"),
            }
        }

        config
    }

    /// Sets the tax rate.
    pub fn tax_rate(mut self, rate: TaxRate) -> Self {
        self.tax_rate = rate;
        self
    }

    /// Sets the stacking policy.
    pub fn stacking_policy(mut self, policy: StackingPolicy) -> Self {
        self.stacking_policy = policy;
        self
    }

    /// Sets whether terminal refunds reverse loyalty/promotion counters.
    pub fn reverse_counters_on_refund(mut self, reverse: bool) -> Self {
        self.reverse_counters_on_refund = reverse;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.tax_rate.is_zero());
        assert_eq!(config.stacking_policy, StackingPolicy::All);
        assert!(config.reverse_counters_on_refund);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::default()
            .tax_rate(TaxRate::from_bps(825))
            .stacking_policy(StackingPolicy::BestOnly)
            .reverse_counters_on_refund(false);

        assert_eq!(config.tax_rate.bps(), 825);
        assert_eq!(config.stacking_policy, StackingPolicy::BestOnly);
        assert!(!config.reverse_counters_on_refund);
    }
}
