//! Integration tests for trading controls and risk metrics
//!
//! These tests load the bundled policy files and drive the cumulative
//! metrics through realistic daily return series.

use chrono::NaiveDate;
use proptest::prelude::*;
use std::fs;
use tickline_risk::{RiskContext, RiskEngine, RiskMetricsCumulative};

fn order(sid: &str, current: i64, amount: i64, price: f64) -> RiskContext {
    RiskContext {
        sid: sid.to_string(),
        current_position: current,
        proposed_amount: amount,
        price,
        orders_today: 0,
    }
}

#[test]
fn test_conservative_policy() {
    let policy_path = concat!(env!("CARGO_MANIFEST_DIR"), "/policies/conservative.yaml");
    let yaml = fs::read_to_string(policy_path).expect("Failed to read conservative policy");

    let engine = RiskEngine::from_yaml(&yaml).unwrap();
    assert_eq!(engine.policies().len(), 4);

    // Small long order is fine
    assert!(engine.evaluate(&order("KR", 0, 100, 40.0)).allowed);

    // Shorting is not
    let decision = engine.evaluate(&order("KR", 0, -100, 40.0));
    assert!(!decision.allowed);
    assert!(decision.violated_policies[0].contains("LongOnly"));

    // Order notional above 25k
    let decision = engine.evaluate(&order("KR", 0, 1000, 40.0));
    assert!(!decision.allowed);
    assert!(decision.violated_policies.iter().any(|v| v.contains("MaxOrderSize")));
}

#[test]
fn test_per_sid_policy() {
    let policy_path = concat!(env!("CARGO_MANIFEST_DIR"), "/policies/per_sid.yaml");
    let yaml = fs::read_to_string(policy_path).expect("Failed to read per-sid policy");

    let engine = RiskEngine::from_yaml(&yaml).unwrap();

    assert!(!engine.evaluate(&order("VRTX", 400, 200, 60.0)).allowed);
    assert!(engine.evaluate(&order("LUV", 400, 200, 12.0)).allowed);

    // Unlisted sid only sees the global order size limit
    assert!(engine.evaluate(&order("MNST", 50_000, 900, 30.0)).allowed);
    assert!(!engine.evaluate(&order("MNST", 0, 1001, 30.0)).allowed);
}

#[test]
fn test_kill_switch_overrides_policies() {
    let engine = RiskEngine::permissive();
    engine.trigger_kill_switch();

    let decision = engine.evaluate(&order("LUV", 0, 1, 10.0));
    assert!(!decision.allowed);
    assert_eq!(decision.violated_policies, vec!["KillSwitch (active)".to_string()]);
}

#[test]
fn test_metrics_over_a_losing_then_recovering_year() {
    let start = NaiveDate::from_ymd_opt(2012, 1, 2).unwrap();
    let mut metrics = RiskMetricsCumulative::new(0.0);

    // 100 days down 0.5% then 100 days up 0.6%
    for i in 0..200 {
        let r = if i < 100 { -0.005 } else { 0.006 };
        metrics.update(start + chrono::Duration::days(i), r, Some(0.0));
    }

    let expected_dd = 1.0 - 0.995f64.powi(100);
    assert!((metrics.calculate_max_drawdown() - expected_dd).abs() < 1e-9);

    let expected_return = 0.995f64.powi(100) * 1.006f64.powi(100) - 1.0;
    assert!((metrics.algorithm_period_return() - expected_return).abs() < 1e-9);

    let report = metrics.report();
    assert_eq!(report.trading_days, 200);
    assert_eq!(report.benchmark_period_return, Some(0.0));
    // Zero-variance benchmark has no beta
    assert!(report.beta.is_none());
}

proptest! {
    #[test]
    fn prop_drawdown_is_a_fraction(returns in prop::collection::vec(-0.5f64..0.5, 1..200)) {
        let start = NaiveDate::from_ymd_opt(2010, 1, 4).unwrap();
        let mut metrics = RiskMetricsCumulative::new(0.0);
        for (i, r) in returns.iter().enumerate() {
            metrics.update(start + chrono::Duration::days(i as i64), *r, None);
        }

        let dd = metrics.calculate_max_drawdown();
        prop_assert!(dd >= 0.0);
        prop_assert!(dd < 1.0);
        prop_assert_eq!(metrics.trading_days(), returns.len());
    }
}
