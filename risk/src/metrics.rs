//! Cumulative risk metrics
//!
//! Metrics are accumulated one trading day at a time while a simulation runs:
//! - Period return: compounded daily returns
//! - Maximum drawdown: largest peak-to-trough decline of the wealth curve
//! - Sharpe ratio: excess return over sample volatility, annualized
//! - Sortino ratio: excess return over downside deviation, annualized
//! - Beta / Alpha: against benchmark returns, when every day has one

use crate::{RiskError, RiskResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Trading days used to annualize daily figures
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Running risk metrics over every completed trading day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetricsCumulative {
    /// Annual risk-free rate
    risk_free_rate: f64,

    dates: Vec<NaiveDate>,
    algorithm_returns: Vec<f64>,
    benchmark_returns: Vec<Option<f64>>,

    wealth: f64,
    peak_wealth: f64,
    max_drawdown: f64,
}

impl Default for RiskMetricsCumulative {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl RiskMetricsCumulative {
    /// Create an empty tracker with an annual risk-free rate
    pub fn new(risk_free_rate: f64) -> Self {
        Self {
            risk_free_rate,
            dates: Vec::new(),
            algorithm_returns: Vec::new(),
            benchmark_returns: Vec::new(),
            wealth: 1.0,
            peak_wealth: 1.0,
            max_drawdown: 0.0,
        }
    }

    /// Annual risk-free rate used for excess returns
    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// Record one trading day
    pub fn update(&mut self, date: NaiveDate, algorithm_return: f64, benchmark_return: Option<f64>) {
        self.dates.push(date);
        self.algorithm_returns.push(algorithm_return);
        self.benchmark_returns.push(benchmark_return);

        self.wealth *= 1.0 + algorithm_return;
        if self.wealth > self.peak_wealth {
            self.peak_wealth = self.wealth;
        }
        if self.peak_wealth > 0.0 {
            let drawdown = (self.peak_wealth - self.wealth) / self.peak_wealth;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }

    /// Number of trading days recorded
    pub fn trading_days(&self) -> usize {
        self.algorithm_returns.len()
    }

    /// Daily algorithm returns in order
    pub fn algorithm_returns(&self) -> &[f64] {
        &self.algorithm_returns
    }

    /// Compounded return over the whole period
    pub fn algorithm_period_return(&self) -> f64 {
        self.wealth - 1.0
    }

    /// Compounded benchmark return, if every day carried one
    pub fn benchmark_period_return(&self) -> Option<f64> {
        let returns = self.complete_benchmark()?;
        Some(returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0)
    }

    /// Largest peak-to-trough decline as a non-negative fraction
    pub fn calculate_max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    /// Annualized Sharpe ratio
    ///
    /// Sharpe = mean(r - rf_daily) / sample_std(r) * sqrt(252)
    pub fn calculate_sharpe(&self) -> RiskResult<f64> {
        let std_dev = self.sample_std_dev()?;
        if std_dev == 0.0 {
            return Err(RiskError::DivisionByZero(
                "Standard deviation is zero".to_string(),
            ));
        }

        Ok(self.mean_excess_return() / std_dev * TRADING_DAYS_PER_YEAR.sqrt())
    }

    /// Annualized Sortino ratio
    ///
    /// Only returns below the daily risk-free rate contribute to the
    /// deviation; the mean is taken over every day.
    pub fn calculate_sortino(&self) -> RiskResult<f64> {
        if self.algorithm_returns.len() < 2 {
            return Err(RiskError::InsufficientData(
                "Need at least 2 returns for Sortino ratio".to_string(),
            ));
        }

        let target = self.daily_risk_free();
        let downside_sq: f64 = self
            .algorithm_returns
            .iter()
            .map(|r| (r - target).min(0.0).powi(2))
            .sum();
        let downside_dev = (downside_sq / self.algorithm_returns.len() as f64).sqrt();

        if downside_dev == 0.0 {
            return Err(RiskError::DivisionByZero(
                "Downside deviation is zero".to_string(),
            ));
        }

        Ok(self.mean_excess_return() / downside_dev * TRADING_DAYS_PER_YEAR.sqrt())
    }

    /// Annualized volatility of daily returns
    pub fn algo_volatility(&self) -> RiskResult<f64> {
        Ok(self.sample_std_dev()? * TRADING_DAYS_PER_YEAR.sqrt())
    }

    /// Beta = Cov(algorithm, benchmark) / Var(benchmark)
    pub fn beta(&self) -> RiskResult<f64> {
        let benchmark = self.complete_benchmark().ok_or_else(|| {
            RiskError::InsufficientData("Benchmark returns missing".to_string())
        })?;
        if benchmark.len() < 2 {
            return Err(RiskError::InsufficientData(
                "Need at least 2 benchmark returns for beta".to_string(),
            ));
        }

        let algo_mean = self.algorithm_returns.iter().mean();
        let bench_mean = benchmark.iter().mean();
        let n = (benchmark.len() - 1) as f64;

        let covariance: f64 = self
            .algorithm_returns
            .iter()
            .zip(benchmark.iter())
            .map(|(a, b)| (a - algo_mean) * (b - bench_mean))
            .sum::<f64>()
            / n;
        let variance = benchmark.iter().variance();

        if variance == 0.0 {
            return Err(RiskError::DivisionByZero(
                "Benchmark variance is zero".to_string(),
            ));
        }

        Ok(covariance / variance)
    }

    /// Annualized Jensen's alpha against the benchmark
    pub fn alpha(&self) -> RiskResult<f64> {
        let beta = self.beta()?;
        let benchmark = self.complete_benchmark().ok_or_else(|| {
            RiskError::InsufficientData("Benchmark returns missing".to_string())
        })?;

        let rf = self.daily_risk_free();
        let algo_mean = self.algorithm_returns.iter().mean();
        let bench_mean = benchmark.iter().mean();

        Ok(((algo_mean - rf) - beta * (bench_mean - rf)) * TRADING_DAYS_PER_YEAR)
    }

    /// Summarize the period; metrics that cannot be computed are `None`
    pub fn report(&self) -> RiskReport {
        RiskReport {
            period_start: self.dates.first().copied(),
            period_end: self.dates.last().copied(),
            trading_days: self.trading_days(),
            algorithm_period_return: self.algorithm_period_return(),
            benchmark_period_return: self.benchmark_period_return(),
            max_drawdown: self.calculate_max_drawdown(),
            sharpe: self.calculate_sharpe().ok(),
            sortino: self.calculate_sortino().ok(),
            algo_volatility: self.algo_volatility().ok(),
            beta: self.beta().ok(),
            alpha: self.alpha().ok(),
        }
    }

    fn daily_risk_free(&self) -> f64 {
        self.risk_free_rate / TRADING_DAYS_PER_YEAR
    }

    fn mean_excess_return(&self) -> f64 {
        self.algorithm_returns.iter().mean() - self.daily_risk_free()
    }

    fn sample_std_dev(&self) -> RiskResult<f64> {
        if self.algorithm_returns.len() < 2 {
            return Err(RiskError::InsufficientData(
                "Need at least 2 returns for standard deviation".to_string(),
            ));
        }
        Ok(self.algorithm_returns.iter().std_dev())
    }

    fn complete_benchmark(&self) -> Option<Vec<f64>> {
        if self.benchmark_returns.is_empty() {
            return None;
        }
        self.benchmark_returns.iter().copied().collect()
    }
}

/// End-of-run risk summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub trading_days: usize,
    pub algorithm_period_return: f64,
    pub benchmark_period_return: Option<f64>,
    pub max_drawdown: f64,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub algo_volatility: Option<f64>,
    pub beta: Option<f64>,
    pub alpha: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2013, 1, 1).unwrap() + chrono::Duration::days(n as i64)
    }

    fn metrics_from(returns: &[f64], risk_free_rate: f64) -> RiskMetricsCumulative {
        let mut metrics = RiskMetricsCumulative::new(risk_free_rate);
        for (i, r) in returns.iter().enumerate() {
            metrics.update(day(i as u32), *r, None);
        }
        metrics
    }

    fn create_test_returns() -> Vec<f64> {
        vec![
            0.01, 0.02, -0.01, 0.015, -0.005,
            0.03, -0.02, 0.01, 0.005, -0.01,
            0.02, 0.01, -0.015, 0.025, 0.01,
            -0.005, 0.015, 0.02, -0.01, 0.005,
        ]
    }

    #[test]
    fn test_period_return_compounds() {
        let metrics = metrics_from(&[0.10, -0.10], 0.0);
        assert_relative_eq!(metrics.algorithm_period_return(), -0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_max_drawdown() {
        let metrics = metrics_from(&[0.10, 0.05, -0.20, -0.10, 0.15, 0.05], 0.0);

        // Peak 1.155 after day two, trough 0.8316 after day four
        assert_relative_eq!(metrics.calculate_max_drawdown(), 0.28, epsilon = 1e-9);
    }

    #[test]
    fn test_max_drawdown_empty_is_zero() {
        let metrics = RiskMetricsCumulative::default();
        assert_eq!(metrics.calculate_max_drawdown(), 0.0);
        assert_eq!(metrics.algorithm_period_return(), 0.0);
    }

    #[test]
    fn test_sharpe_ratio() {
        let returns = create_test_returns();
        let metrics = metrics_from(&returns, 0.02);

        let sharpe = metrics.calculate_sharpe().unwrap();
        assert!(sharpe > 0.0);

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
            / (returns.len() - 1) as f64;
        let expected = (mean - 0.02 / 252.0) / var.sqrt() * 252f64.sqrt();
        assert_relative_eq!(sharpe, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_sortino_exceeds_sharpe_for_positive_skew() {
        let metrics = metrics_from(&create_test_returns(), 0.0);

        let sortino = metrics.calculate_sortino().unwrap();
        let sharpe = metrics.calculate_sharpe().unwrap();
        assert!(sortino > 0.0);
        assert!(sortino >= sharpe);
    }

    #[test]
    fn test_constant_returns_have_no_sharpe() {
        let metrics = metrics_from(&[0.01, 0.01, 0.01], 0.0);
        assert!(matches!(
            metrics.calculate_sharpe(),
            Err(RiskError::DivisionByZero(_))
        ));
        assert!(matches!(
            metrics.calculate_sortino(),
            Err(RiskError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_single_return_is_insufficient() {
        let metrics = metrics_from(&[0.01], 0.0);
        assert!(matches!(
            metrics.calculate_sharpe(),
            Err(RiskError::InsufficientData(_))
        ));
        assert!(metrics.algo_volatility().is_err());
    }

    #[test]
    fn test_beta_against_scaled_benchmark() {
        let benchmark = create_test_returns();
        let mut metrics = RiskMetricsCumulative::new(0.0);
        for (i, b) in benchmark.iter().enumerate() {
            metrics.update(day(i as u32), 2.0 * b, Some(*b));
        }

        assert_relative_eq!(metrics.beta().unwrap(), 2.0, epsilon = 1e-9);
        // Perfectly explained by the benchmark: no alpha beyond leverage
        assert_relative_eq!(metrics.alpha().unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_beta_requires_benchmark_every_day() {
        let mut metrics = RiskMetricsCumulative::new(0.0);
        metrics.update(day(0), 0.01, Some(0.01));
        metrics.update(day(1), 0.02, None);
        metrics.update(day(2), -0.01, Some(0.00));

        assert!(metrics.beta().is_err());
        assert!(metrics.benchmark_period_return().is_none());
    }

    #[test]
    fn test_report_fields() {
        let metrics = metrics_from(&create_test_returns(), 0.0);
        let report = metrics.report();

        assert_eq!(report.trading_days, 20);
        assert_eq!(report.period_start, Some(day(0)));
        assert_eq!(report.period_end, Some(day(19)));
        assert!(report.sharpe.is_some());
        assert!(report.beta.is_none());
        assert_eq!(report.max_drawdown, metrics.calculate_max_drawdown());
    }
}
