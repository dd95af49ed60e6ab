//! Parameter optimisation
//!
//! Runs one backtest per candidate parameter and ranks the results.

use crate::algorithm::{Algorithm, TradingAlgorithm};
use crate::error::{AlgoError, AlgoResult};
use crate::source::BarFrame;
use serde::{Deserialize, Serialize};

/// Outcome of one candidate's backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRun<P> {
    pub params: P,
    pub total_return: f64,
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
}

/// Backtest every candidate over `frame`, best total return first
///
/// `build` turns a candidate into a configured runner.
pub async fn grid_search<P, A, F>(
    candidates: Vec<P>,
    mut build: F,
    frame: &BarFrame,
) -> AlgoResult<Vec<OptimizationRun<P>>>
where
    P: Clone + std::fmt::Debug,
    A: Algorithm,
    F: FnMut(&P) -> AlgoResult<TradingAlgorithm<A>>,
{
    if candidates.is_empty() {
        return Err(AlgoError::InvalidParameter(
            "grid search needs at least one candidate".to_string(),
        ));
    }

    let mut runs = Vec::with_capacity(candidates.len());
    for params in candidates {
        let mut runner = build(&params)?;
        runner.run(frame).await?;

        let tracker = runner
            .perf_tracker()
            .ok_or_else(|| AlgoError::Other("run produced no tracker".to_string()))?;
        let metrics = tracker.cumulative_risk_metrics();

        let run = OptimizationRun {
            total_return: tracker.returns(),
            sharpe: metrics.calculate_sharpe().ok(),
            max_drawdown: metrics.calculate_max_drawdown(),
            params,
        };
        tracing::debug!(params = ?run.params, total_return = run.total_return, "Candidate evaluated");
        runs.push(run);
    }

    runs.sort_by(|a, b| b.total_return.total_cmp(&a.total_return));

    if let Some(best) = runs.first() {
        tracing::info!(
            candidates = runs.len(),
            best = ?best.params,
            total_return = best.total_return,
            "Grid search finished"
        );
    }
    Ok(runs)
}
