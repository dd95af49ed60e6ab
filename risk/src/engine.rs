//! Trading control evaluation engine
//!
//! This module checks proposed orders against the loaded trading controls.

use crate::policy::{PolicyRule, RiskPolicyConfig};
use crate::{RiskContext, RiskDecision, RiskResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Trading control engine
///
/// Loads policies and evaluates proposed orders against them. It maintains
/// state for the runtime kill-switch.
#[derive(Debug, Default)]
pub struct RiskEngine {
    config: RiskPolicyConfig,
    kill_switch_active: AtomicBool,
}

impl RiskEngine {
    /// Create a new RiskEngine from a configuration
    pub fn new(config: RiskPolicyConfig) -> Self {
        Self {
            config,
            kill_switch_active: AtomicBool::new(false),
        }
    }

    /// Engine with no controls; every order is allowed
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Load policies from YAML string
    ///
    /// # Example
    ///
    /// ```
    /// use tickline_risk::RiskEngine;
    ///
    /// let yaml = r#"
    /// policies:
    ///   - type: MaxOrderSize
    ///     max_shares: 1000
    /// "#;
    ///
    /// let engine = RiskEngine::from_yaml(yaml).unwrap();
    /// assert_eq!(engine.policies().len(), 1);
    /// ```
    pub fn from_yaml(yaml: &str) -> RiskResult<Self> {
        let config: RiskPolicyConfig = serde_yaml::from_str(yaml)?;
        Ok(Self::new(config))
    }

    /// Load policies from JSON string
    pub fn from_json(json: &str) -> RiskResult<Self> {
        let config: RiskPolicyConfig = serde_json::from_str(json)?;
        Ok(Self::new(config))
    }

    /// Loaded policies
    pub fn policies(&self) -> &[PolicyRule] {
        &self.config.policies
    }

    /// Evaluate if an order is allowed based on current policies
    ///
    /// # Example
    ///
    /// ```
    /// use tickline_risk::{RiskEngine, RiskContext};
    ///
    /// let yaml = r#"
    /// policies:
    ///   - type: MaxPositionSize
    ///     max_shares: 1000
    /// "#;
    ///
    /// let engine = RiskEngine::from_yaml(yaml).unwrap();
    /// let ctx = RiskContext {
    ///     sid: "VRTX".to_string(),
    ///     current_position: 500,
    ///     proposed_amount: 600,
    ///     price: 40.0,
    ///     orders_today: 0,
    /// };
    ///
    /// let decision = engine.evaluate(&ctx);
    /// assert!(!decision.allowed); // Would result in 1100 shares
    /// ```
    pub fn evaluate(&self, ctx: &RiskContext) -> RiskDecision {
        if self.is_kill_switch_active() {
            return RiskDecision::reject(vec!["KillSwitch (active)".to_string()]);
        }

        let violated_policies: Vec<String> = self
            .config
            .policies
            .iter()
            .filter(|policy| policy.applies_to_sid(&ctx.sid))
            .filter_map(|policy| self.evaluate_policy(policy, ctx))
            .collect();

        if violated_policies.is_empty() {
            RiskDecision::allow()
        } else {
            tracing::warn!(
                sid = %ctx.sid,
                amount = ctx.proposed_amount,
                violations = ?violated_policies,
                "Order blocked by trading controls"
            );
            RiskDecision::reject(violated_policies)
        }
    }

    /// Trigger the kill-switch, blocking all future orders
    pub fn trigger_kill_switch(&self) {
        self.kill_switch_active.store(true, Ordering::SeqCst);
    }

    /// Reset the kill-switch, allowing orders again
    pub fn reset_kill_switch(&self) {
        self.kill_switch_active.store(false, Ordering::SeqCst);
    }

    /// Check if kill-switch is currently active
    pub fn is_kill_switch_active(&self) -> bool {
        self.kill_switch_active.load(Ordering::SeqCst)
    }

    /// Returns Some(violation_message) if policy is violated, None otherwise
    fn evaluate_policy(&self, policy: &PolicyRule, ctx: &RiskContext) -> Option<String> {
        match policy {
            PolicyRule::MaxPositionSize { max_shares, max_notional, .. } => {
                let new_position = ctx.resulting_position();
                if let Some(max) = max_shares {
                    if new_position.abs() > *max {
                        return Some(format!(
                            "MaxPositionSize ({}): position {} exceeds max {} shares",
                            ctx.sid,
                            new_position.abs(),
                            max
                        ));
                    }
                }
                match max_notional {
                    Some(max) if !ctx.has_price() => Some(format!(
                        "MaxPositionSize ({}): no price to check notional limit {:.2}",
                        ctx.sid, max
                    )),
                    Some(max) if new_position.abs() as f64 * ctx.price > *max => Some(format!(
                        "MaxPositionSize ({}): notional {:.2} exceeds max {:.2}",
                        ctx.sid,
                        new_position.abs() as f64 * ctx.price,
                        max
                    )),
                    _ => None,
                }
            }
            PolicyRule::MaxOrderSize { max_shares, max_notional, .. } => {
                let amount = ctx.proposed_amount.abs();
                if let Some(max) = max_shares {
                    if amount > *max {
                        return Some(format!(
                            "MaxOrderSize ({}): order of {} exceeds max {} shares",
                            ctx.sid, amount, max
                        ));
                    }
                }
                match max_notional {
                    Some(max) if !ctx.has_price() => Some(format!(
                        "MaxOrderSize ({}): no price to check notional limit {:.2}",
                        ctx.sid, max
                    )),
                    Some(max) if amount as f64 * ctx.price > *max => Some(format!(
                        "MaxOrderSize ({}): order notional {:.2} exceeds max {:.2}",
                        ctx.sid,
                        amount as f64 * ctx.price,
                        max
                    )),
                    _ => None,
                }
            }
            PolicyRule::MaxOrderCount { max_count } => {
                if ctx.orders_today >= *max_count {
                    Some(format!(
                        "MaxOrderCount: {} orders already placed today (max {})",
                        ctx.orders_today, max_count
                    ))
                } else {
                    None
                }
            }
            PolicyRule::LongOnly { .. } => {
                let new_position = ctx.resulting_position();
                if new_position < 0 {
                    Some(format!(
                        "LongOnly ({}): order would leave position at {}",
                        ctx.sid, new_position
                    ))
                } else {
                    None
                }
            }
            PolicyRule::KillSwitch { enabled } => {
                if *enabled {
                    Some("KillSwitch: enabled in policy".to_string())
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RiskError;

    fn ctx(sid: &str, current: i64, proposed: i64, price: f64) -> RiskContext {
        RiskContext {
            sid: sid.to_string(),
            current_position: current,
            proposed_amount: proposed,
            price,
            orders_today: 0,
        }
    }

    #[test]
    fn test_max_position_size_global() {
        let yaml = r#"
policies:
  - type: MaxPositionSize
    max_shares: 1000
"#;
        let engine = RiskEngine::from_yaml(yaml).unwrap();

        assert!(engine.evaluate(&ctx("LUV", 500, 400, 10.0)).allowed);

        let decision = engine.evaluate(&ctx("LUV", 800, 300, 10.0));
        assert!(!decision.allowed);
        assert_eq!(decision.violated_policies.len(), 1);
        assert!(decision.violated_policies[0].contains("MaxPositionSize"));
    }

    #[test]
    fn test_max_position_size_per_sid() {
        let yaml = r#"
policies:
  - type: MaxPositionSize
    sid: "LUV"
    max_shares: 500
  - type: MaxPositionSize
    sid: "VRTX"
    max_shares: 1000
"#;
        let engine = RiskEngine::from_yaml(yaml).unwrap();

        assert!(!engine.evaluate(&ctx("LUV", 400, 200, 10.0)).allowed);
        assert!(engine.evaluate(&ctx("VRTX", 400, 200, 10.0)).allowed);
        assert!(engine.evaluate(&ctx("KR", 5000, 5000, 10.0)).allowed);
    }

    #[test]
    fn test_max_position_notional() {
        let yaml = r#"
policies:
  - type: MaxPositionSize
    max_notional: 10000.0
"#;
        let engine = RiskEngine::from_yaml(yaml).unwrap();

        assert!(engine.evaluate(&ctx("LUV", 0, 100, 99.0)).allowed);
        assert!(!engine.evaluate(&ctx("LUV", 0, 100, 101.0)).allowed);
    }

    #[test]
    fn test_max_order_size() {
        let yaml = r#"
policies:
  - type: MaxOrderSize
    max_shares: 100
"#;
        let engine = RiskEngine::from_yaml(yaml).unwrap();

        // Resulting position is irrelevant, only the order itself
        assert!(engine.evaluate(&ctx("LUV", 10_000, -100, 10.0)).allowed);
        let decision = engine.evaluate(&ctx("LUV", 0, -101, 10.0));
        assert!(!decision.allowed);
        assert!(decision.violated_policies[0].contains("MaxOrderSize"));
    }

    #[test]
    fn test_max_order_count() {
        let yaml = r#"
policies:
  - type: MaxOrderCount
    max_count: 2
"#;
        let engine = RiskEngine::from_yaml(yaml).unwrap();

        let mut context = ctx("LUV", 0, 10, 10.0);
        context.orders_today = 1;
        assert!(engine.evaluate(&context).allowed);

        context.orders_today = 2;
        assert!(!engine.evaluate(&context).allowed);
    }

    #[test]
    fn test_long_only() {
        let yaml = r#"
policies:
  - type: LongOnly
"#;
        let engine = RiskEngine::from_yaml(yaml).unwrap();

        assert!(engine.evaluate(&ctx("LUV", 100, -100, 10.0)).allowed);
        let decision = engine.evaluate(&ctx("LUV", 100, -101, 10.0));
        assert!(!decision.allowed);
        assert!(decision.violated_policies[0].contains("LongOnly"));
    }

    #[test]
    fn test_kill_switch_in_policy() {
        let yaml = r#"
policies:
  - type: KillSwitch
    enabled: true
"#;
        let engine = RiskEngine::from_yaml(yaml).unwrap();

        let decision = engine.evaluate(&ctx("LUV", 0, 1, 10.0));
        assert!(!decision.allowed);
        assert!(decision.violated_policies[0].contains("KillSwitch"));
    }

    #[test]
    fn test_kill_switch_trigger() {
        let engine = RiskEngine::permissive();
        let context = ctx("LUV", 100, 50, 10.0);

        assert!(engine.evaluate(&context).allowed);

        engine.trigger_kill_switch();
        assert!(engine.is_kill_switch_active());

        let decision = engine.evaluate(&context);
        assert!(!decision.allowed);
        assert!(decision.violated_policies[0].contains("KillSwitch (active)"));

        engine.reset_kill_switch();
        assert!(!engine.is_kill_switch_active());
        assert!(engine.evaluate(&context).allowed);
    }

    #[test]
    fn test_multiple_violations() {
        let yaml = r#"
policies:
  - type: MaxPositionSize
    max_shares: 100
  - type: MaxOrderSize
    max_shares: 10
"#;
        let engine = RiskEngine::from_yaml(yaml).unwrap();

        let decision = engine.evaluate(&ctx("LUV", 80, 50, 10.0));
        assert!(!decision.allowed);
        assert_eq!(decision.violated_policies.len(), 2);
    }

    #[test]
    fn test_notional_limits_require_a_price() {
        let yaml = r#"
policies:
  - type: MaxOrderSize
    max_notional: 25000.0
  - type: MaxPositionSize
    max_notional: 50000.0
"#;
        let engine = RiskEngine::from_yaml(yaml).unwrap();

        let decision = engine.evaluate(&ctx("LUV", 0, 1_000_000, 0.0));
        assert!(!decision.allowed);
        assert_eq!(decision.violated_policies.len(), 2);
        assert!(decision.violated_policies[0].contains("no price"));

        assert!(!engine.evaluate(&ctx("LUV", 0, 1, f64::NAN)).allowed);
        assert!(engine.evaluate(&ctx("LUV", 0, 1, 10.0)).allowed);

        // Share limits alone do not need a price
        let shares_only = RiskEngine::from_yaml(
            r#"
policies:
  - type: MaxOrderSize
    max_shares: 100
"#,
        )
        .unwrap();
        assert!(shares_only.evaluate(&ctx("LUV", 0, 100, 0.0)).allowed);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{ "policies": [ { "type": "MaxPositionSize", "max_shares": 2000 } ] }"#;
        let engine = RiskEngine::from_json(json).unwrap();
        assert!(engine.evaluate(&ctx("LUV", 1000, 500, 10.0)).allowed);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = RiskEngine::from_yaml("invalid: {yaml: [structure");
        assert!(matches!(result, Err(RiskError::Yaml(_))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            RiskEngine::from_json("{invalid json}"),
            Err(RiskError::Json(_))
        ));
    }
}
