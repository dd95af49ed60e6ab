//! Trading control definitions and configuration
//!
//! Trading controls are pre-trade checks evaluated against every order an
//! algorithm places during a simulation.

use serde::{Deserialize, Serialize};

/// Complete trading control configuration
///
/// Typically loaded from a YAML or JSON policy file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RiskPolicyConfig {
    /// List of policy rules to evaluate
    #[serde(default)]
    pub policies: Vec<PolicyRule>,
}

/// Individual trading control
///
/// Rules carrying a `sid` only apply to that instrument; `None` applies the
/// rule to every instrument.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum PolicyRule {
    /// Limit the resulting position after an order fills
    ///
    /// Checks |current_position + proposed_amount| <= max_shares and
    /// |resulting position| * price <= max_notional.
    MaxPositionSize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sid: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_shares: Option<i64>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_notional: Option<f64>,
    },

    /// Limit the size of a single order
    MaxOrderSize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sid: Option<String>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_shares: Option<i64>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_notional: Option<f64>,
    },

    /// Limit the number of orders placed per trading day
    MaxOrderCount {
        max_count: usize,
    },

    /// Disallow short positions
    LongOnly {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sid: Option<String>,
    },

    /// Emergency kill switch
    ///
    /// When enabled, blocks all trading activity.
    KillSwitch {
        enabled: bool,
    },
}

impl PolicyRule {
    /// Get a human-readable name for this policy type
    pub fn name(&self) -> &'static str {
        match self {
            PolicyRule::MaxPositionSize { .. } => "MaxPositionSize",
            PolicyRule::MaxOrderSize { .. } => "MaxOrderSize",
            PolicyRule::MaxOrderCount { .. } => "MaxOrderCount",
            PolicyRule::LongOnly { .. } => "LongOnly",
            PolicyRule::KillSwitch { .. } => "KillSwitch",
        }
    }

    /// Check if this policy applies to the given sid
    pub fn applies_to_sid(&self, sid: &str) -> bool {
        match self {
            PolicyRule::MaxPositionSize { sid: Some(rule_sid), .. }
            | PolicyRule::MaxOrderSize { sid: Some(rule_sid), .. }
            | PolicyRule::LongOnly { sid: Some(rule_sid) } => rule_sid == sid,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_deserialization_yaml() {
        let yaml = r#"
policies:
  - type: MaxPositionSize
    sid: "VRTX"
    max_shares: 1000
  - type: MaxOrderSize
    max_notional: 50000.0
  - type: MaxOrderCount
    max_count: 20
  - type: LongOnly
  - type: KillSwitch
    enabled: false
"#;

        let config: RiskPolicyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.policies.len(), 5);

        match &config.policies[0] {
            PolicyRule::MaxPositionSize { sid, max_shares, max_notional } => {
                assert_eq!(sid.as_deref(), Some("VRTX"));
                assert_eq!(*max_shares, Some(1000));
                assert!(max_notional.is_none());
            }
            _ => panic!("Expected MaxPositionSize"),
        }

        match &config.policies[1] {
            PolicyRule::MaxOrderSize { sid, max_notional, .. } => {
                assert!(sid.is_none());
                assert_eq!(*max_notional, Some(50000.0));
            }
            _ => panic!("Expected MaxOrderSize"),
        }

        match &config.policies[3] {
            PolicyRule::LongOnly { sid } => assert!(sid.is_none()),
            _ => panic!("Expected LongOnly"),
        }
    }

    #[test]
    fn test_policy_deserialization_json() {
        let json = r#"{
  "policies": [
    { "type": "MaxOrderCount", "max_count": 5 },
    { "type": "KillSwitch", "enabled": true }
  ]
}"#;

        let config: RiskPolicyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.policies.len(), 2);
        assert_eq!(config.policies[1].name(), "KillSwitch");
    }

    #[test]
    fn test_policy_serialization_skips_empty_limits() {
        let config = RiskPolicyConfig {
            policies: vec![PolicyRule::MaxPositionSize {
                sid: None,
                max_shares: Some(200),
                max_notional: None,
            }],
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("MaxPositionSize"));
        assert!(yaml.contains("max_shares"));
        assert!(!yaml.contains("max_notional"));
    }

    #[test]
    fn test_applies_to_sid() {
        let global = PolicyRule::MaxPositionSize {
            sid: None,
            max_shares: Some(100),
            max_notional: None,
        };
        assert!(global.applies_to_sid("LUV"));

        let scoped = PolicyRule::MaxOrderSize {
            sid: Some("LUV".to_string()),
            max_shares: Some(10),
            max_notional: None,
        };
        assert!(scoped.applies_to_sid("LUV"));
        assert!(!scoped.applies_to_sid("KR"));

        assert!(PolicyRule::MaxOrderCount { max_count: 1 }.applies_to_sid("KR"));
    }
}
