//! # tickline-risk: Trading Controls and Risk Metrics
//!
//! This library provides the risk side of the tickline backtesting engine.
//!
//! ## Core Components
//!
//! - **RiskEngine**: Pre-trade trading controls evaluated for every order
//! - **Policy System**: YAML/JSON-based control definitions
//! - **RiskMetricsCumulative**: Daily return accumulation with drawdown,
//!   Sharpe, Sortino, volatility, alpha and beta
//!
//! ## Example Usage
//!
//! ```rust
//! use tickline_risk::{RiskEngine, RiskContext};
//!
//! let yaml = r#"
//! policies:
//!   - type: MaxPositionSize
//!     sid: "VRTX"
//!     max_shares: 1000
//!   - type: LongOnly
//! "#;
//!
//! let engine = RiskEngine::from_yaml(yaml).unwrap();
//!
//! let ctx = RiskContext {
//!     sid: "VRTX".to_string(),
//!     current_position: 0,
//!     proposed_amount: -10,
//!     price: 45.0,
//!     orders_today: 0,
//! };
//!
//! let decision = engine.evaluate(&ctx);
//! assert!(!decision.allowed); // Would open a short position
//! ```

mod engine;
mod error;
mod metrics;
mod policy;

pub use engine::RiskEngine;
pub use error::{RiskError, RiskResult};
pub use metrics::{RiskMetricsCumulative, RiskReport, TRADING_DAYS_PER_YEAR};
pub use policy::{PolicyRule, RiskPolicyConfig};

use serde::{Deserialize, Serialize};

/// Context information for evaluating a proposed order
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskContext {
    /// Instrument identifier (e.g., "VRTX")
    pub sid: String,

    /// Current position in shares (positive = long, negative = short)
    pub current_position: i64,

    /// Proposed order amount in shares (signed: +buy, -sell)
    pub proposed_amount: i64,

    /// Latest known price for the instrument, 0.0 when none has been seen
    pub price: f64,

    /// Orders already placed on the current trading day
    pub orders_today: usize,
}

impl RiskContext {
    /// Position after the proposed order fills completely
    pub fn resulting_position(&self) -> i64 {
        self.current_position + self.proposed_amount
    }

    /// Whether notional limits can be evaluated
    pub fn has_price(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Result of risk evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    /// Whether the order is allowed
    pub allowed: bool,

    /// Descriptions of the violated controls
    pub violated_policies: Vec<String>,
}

impl RiskDecision {
    /// Create a decision that allows the order
    pub fn allow() -> Self {
        Self {
            allowed: true,
            violated_policies: Vec::new(),
        }
    }

    /// Create a decision that rejects the order
    pub fn reject(violated_policies: Vec<String>) -> Self {
        Self {
            allowed: false,
            violated_policies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resulting_position() {
        let ctx = RiskContext {
            sid: "LUV".to_string(),
            current_position: 100,
            proposed_amount: -150,
            price: 10.0,
            orders_today: 0,
        };

        assert_eq!(ctx.resulting_position(), -50);
        assert!(ctx.has_price());
    }

    #[test]
    fn test_risk_decision_allow() {
        let decision = RiskDecision::allow();
        assert!(decision.allowed);
        assert!(decision.violated_policies.is_empty());
    }

    #[test]
    fn test_risk_decision_reject() {
        let decision = RiskDecision::reject(vec!["LongOnly".to_string()]);
        assert!(!decision.allowed);
        assert_eq!(decision.violated_policies, vec!["LongOnly".to_string()]);
    }
}
