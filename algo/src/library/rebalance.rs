//! Periodic target-weight rebalancing

use crate::{AlgoContext, AlgoError, AlgoResult, Algorithm, AlgorithmMetadata, BarData, Sid};
use async_trait::async_trait;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Target weights and rebalance interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// Fraction of portfolio value per sid
    pub weights: IndexMap<Sid, f64>,
    /// Days between rebalances, measured in exchange time
    #[serde(default = "default_rebalance_days")]
    pub rebalance_days: u32,
}

fn default_rebalance_days() -> u32 {
    7
}

/// Keeps holdings at fixed fractions of the portfolio
///
/// On the first bar, and whenever exchange time reaches the next scheduled
/// rebalance, every weighted sid present in the bar data is ordered to its
/// target percent.
#[derive(Debug, Clone)]
pub struct RebalanceAlgorithm {
    weights: IndexMap<Sid, f64>,
    rebalance_days: u32,
    rebalance_date: Option<DateTime<Tz>>,
    next_rebalance_date: Option<DateTime<Tz>>,
    /// Number of rebalances performed
    pub rebalance_count: usize,
}

impl RebalanceAlgorithm {
    pub fn new(config: RebalanceConfig) -> AlgoResult<Self> {
        if config.rebalance_days == 0 {
            return Err(AlgoError::InvalidParameter(
                "rebalance_days must be positive".to_string(),
            ));
        }
        if let Some((sid, weight)) = config.weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(AlgoError::InvalidParameter(format!(
                "weight for {} is not finite: {}",
                sid, weight
            )));
        }

        let gross: f64 = config.weights.values().map(|w| w.abs()).sum();
        if gross > 1.0 {
            tracing::warn!(gross, "Target weights exceed the portfolio value");
        }

        Ok(Self {
            weights: config.weights,
            rebalance_days: config.rebalance_days,
            rebalance_date: None,
            next_rebalance_date: None,
            rebalance_count: 0,
        })
    }

    pub fn weights(&self) -> &IndexMap<Sid, f64> {
        &self.weights
    }

    /// Exchange time of the last rebalance
    pub fn rebalance_date(&self) -> Option<DateTime<Tz>> {
        self.rebalance_date
    }

    pub fn next_rebalance_date(&self) -> Option<DateTime<Tz>> {
        self.next_rebalance_date
    }

    fn is_due(&self, exchange_time: DateTime<Tz>) -> bool {
        match self.next_rebalance_date {
            None => true,
            Some(next) => exchange_time >= next,
        }
    }

    fn rebalance(&mut self, ctx: &mut AlgoContext, data: &BarData) -> AlgoResult<()> {
        for (sid, weight) in &self.weights {
            if !data.contains(sid) {
                continue;
            }
            match ctx.order_target_percent(sid, *weight) {
                Ok(_) | Err(AlgoError::RiskRejected { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        self.rebalance_count += 1;
        Ok(())
    }
}

#[async_trait]
impl Algorithm for RebalanceAlgorithm {
    async fn initialize(&mut self, _ctx: &mut AlgoContext) -> AlgoResult<()> {
        tracing::info!(
            sids = self.weights.len(),
            rebalance_days = self.rebalance_days,
            "Rebalance algorithm initialized"
        );
        Ok(())
    }

    async fn handle_data(&mut self, ctx: &mut AlgoContext, data: &BarData) -> AlgoResult<()> {
        let Some(exchange_time) = ctx.exchange_time() else {
            return Ok(());
        };

        if self.is_due(exchange_time) {
            self.rebalance_date = Some(exchange_time);
            self.next_rebalance_date =
                Some(exchange_time + Duration::days(i64::from(self.rebalance_days)));
            self.rebalance(ctx, data)?;

            tracing::debug!(at = %exchange_time, "Rebalanced portfolio");
        }

        let portfolio = ctx.portfolio();
        if portfolio.portfolio_value > 0.0 {
            let exposure = portfolio.positions_value / portfolio.portfolio_value;
            ctx.record("exposure", exposure);
        }
        Ok(())
    }

    async fn analyze(&mut self, ctx: &mut AlgoContext) -> AlgoResult<()> {
        tracing::info!(
            rebalances = self.rebalance_count,
            portfolio_value = ctx.portfolio().portfolio_value,
            "Rebalance algorithm finished"
        );
        Ok(())
    }

    fn sid_filter(&self) -> Vec<Sid> {
        self.weights.keys().cloned().collect()
    }

    fn metadata(&self) -> AlgorithmMetadata {
        AlgorithmMetadata {
            name: "Rebalance".to_string(),
            version: "1.0.0".to_string(),
            description: "Periodic rebalance toward target weights".to_string(),
            sids: self.sid_filter(),
        }
    }
}
