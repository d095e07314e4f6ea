//! Engine configuration
//!
//! Commission and return-window parameters are captured into each order at
//! creation time; the settlement sweep and refund workflow read the stamped
//! values, never a live global.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// When vendor earnings become withdrawable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementPolicy {
    /// Credit the available balance immediately on delivery
    Direct,
    /// Credit the pending balance on delivery; the sweep releases it once
    /// the return window closes
    HoldUntilWindowClose,
}

/// Auto-approval policy for return requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPolicy {
    pub auto_approve_enabled: bool,
    /// Requests above this amount always wait for staff review
    pub auto_approve_max_amount: Decimal,
}

impl Default for ReturnPolicy {
    fn default() -> Self {
        Self {
            auto_approve_enabled: true,
            auto_approve_max_amount: Decimal::from(500),
        }
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Platform commission as a fraction of the vendor subtotal (0.10 = 10%)
    pub commission_rate: Decimal,
    /// Days after delivery during which a return may be requested
    pub return_window_days: i64,
    pub settlement_policy: SettlementPolicy,
    pub return_policy: ReturnPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_rate: Decimal::new(10, 2), // 0.10
            return_window_days: 7,
            settlement_policy: SettlementPolicy::Direct,
            return_policy: ReturnPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_commission_is_ten_percent() {
        let config = EngineConfig::default();
        assert_eq!(config.commission_rate, dec!(0.10));
        assert_eq!(config.return_window_days, 7);
        assert_eq!(config.settlement_policy, SettlementPolicy::Direct);
    }
}
