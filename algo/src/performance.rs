//! Performance tracking
//!
//! The tracker owns the simulated account: cash, positions and the
//! transactions applied to them. It keeps a cumulative period spanning the
//! whole run and a daily period that is closed at every day boundary. Each
//! closed day feeds [`RiskMetricsCumulative`].

use crate::environment::TradingEnvironment;
use crate::types::{Order, Portfolio, Position, Sid, Transaction};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tickline_risk::RiskMetricsCumulative;

/// Results of one simulated trading day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPerf {
    pub period_open: DateTime<Utc>,
    pub period_close: DateTime<Utc>,
    pub starting_cash: f64,
    pub ending_cash: f64,
    pub starting_value: f64,
    pub ending_value: f64,
    pub portfolio_value: f64,
    pub pnl: f64,
    pub returns: f64,
    pub capital_used: f64,
    /// Orders created during the day, in their end-of-day state
    pub orders: Vec<Order>,
    pub transactions: Vec<Transaction>,
    /// Positions held at the close
    pub positions: Vec<Position>,
    /// Values recorded by the algorithm during the day
    pub recorded_vars: IndexMap<String, f64>,
}

/// Accounting period: balances at its start and activity since
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformancePeriod {
    pub starting_cash: f64,
    pub starting_value: f64,
    /// Net cash spent on trades, excluding commission
    pub capital_used: f64,
    pub commissions: f64,
    pub transactions: Vec<Transaction>,
}

impl PerformancePeriod {
    fn new(starting_cash: f64, starting_value: f64) -> Self {
        Self {
            starting_cash,
            starting_value,
            ..Default::default()
        }
    }

    fn record(&mut self, txn: &Transaction) {
        self.capital_used += txn.cash_flow();
        self.commissions += txn.commission;
        self.transactions.push(txn.clone());
    }

    /// Profit since the period started
    pub fn pnl(&self, ending_cash: f64, ending_value: f64) -> f64 {
        (ending_cash + ending_value) - (self.starting_cash + self.starting_value)
    }

    /// Profit as a fraction of the starting balance
    pub fn returns(&self, ending_cash: f64, ending_value: f64) -> f64 {
        let base = self.starting_cash + self.starting_value;
        if base == 0.0 {
            return 0.0;
        }
        self.pnl(ending_cash, ending_value) / base
    }
}

/// Account and return tracking for one simulation
#[derive(Debug)]
pub struct PerformanceTracker {
    capital_base: f64,
    start_date: DateTime<Utc>,
    cash: f64,
    positions: BTreeMap<Sid, Position>,
    cumulative: PerformancePeriod,
    today: PerformancePeriod,
    risk: RiskMetricsCumulative,
    benchmark_sid: Option<Sid>,
    benchmark_prev_close: Option<f64>,
    benchmark_last: Option<f64>,
    days: usize,
}

impl PerformanceTracker {
    pub fn new(env: &TradingEnvironment) -> Self {
        Self {
            capital_base: env.capital_base,
            start_date: env.period_start,
            cash: env.capital_base,
            positions: BTreeMap::new(),
            cumulative: PerformancePeriod::new(env.capital_base, 0.0),
            today: PerformancePeriod::new(env.capital_base, 0.0),
            risk: RiskMetricsCumulative::new(env.risk_free_rate),
            benchmark_sid: env.benchmark_sid.clone(),
            benchmark_prev_close: None,
            benchmark_last: None,
            days: 0,
        }
    }

    /// Apply a fill to cash and positions
    pub fn process_transaction(&mut self, txn: &Transaction) {
        self.cash += txn.cash_flow() - txn.commission;
        self.positions
            .entry(txn.sid.clone())
            .or_insert_with(|| Position::new(txn.sid.clone()))
            .apply_transaction(txn);

        self.cumulative.record(txn);
        self.today.record(txn);
    }

    /// Mark a sid at its latest trade price
    pub fn update_price(&mut self, sid: &str, price: f64, dt: DateTime<Utc>) {
        if let Some(position) = self.positions.get_mut(sid) {
            position.update_price(price, dt);
        }

        if self.benchmark_sid.as_deref() == Some(sid) {
            if self.benchmark_prev_close.is_none() {
                self.benchmark_prev_close = Some(price);
            }
            self.benchmark_last = Some(price);
        }
    }

    /// Market value of all positions
    pub fn positions_value(&self) -> f64 {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Close the current day and start the next one
    pub fn handle_market_close(
        &mut self,
        period_open: DateTime<Utc>,
        period_close: DateTime<Utc>,
        orders: Vec<Order>,
        recorded_vars: IndexMap<String, f64>,
    ) -> DailyPerf {
        let ending_cash = self.cash;
        let ending_value = self.positions_value();
        let returns = self.today.returns(ending_cash, ending_value);

        let benchmark_return = match (self.benchmark_prev_close, self.benchmark_last) {
            (Some(prev), Some(last)) if prev != 0.0 => Some(last / prev - 1.0),
            _ => None,
        };
        self.benchmark_prev_close = self.benchmark_last;

        self.risk
            .update(period_close.date_naive(), returns, benchmark_return);
        self.days += 1;

        let today = std::mem::replace(
            &mut self.today,
            PerformancePeriod::new(ending_cash, ending_value),
        );

        let perf = DailyPerf {
            period_open,
            period_close,
            starting_cash: today.starting_cash,
            ending_cash,
            starting_value: today.starting_value,
            ending_value,
            portfolio_value: ending_cash + ending_value,
            pnl: today.pnl(ending_cash, ending_value),
            returns,
            capital_used: today.capital_used,
            orders,
            transactions: today.transactions,
            positions: self
                .positions
                .values()
                .filter(|p| !p.is_flat())
                .cloned()
                .collect(),
            recorded_vars,
        };

        tracing::debug!(
            date = %period_close.date_naive(),
            portfolio_value = perf.portfolio_value,
            returns = perf.returns,
            "Closed trading day"
        );

        perf
    }

    /// Snapshot of the account for the algorithm
    pub fn portfolio(&self) -> Portfolio {
        let positions_value = self.positions_value();
        let portfolio_value = self.cash + positions_value;

        Portfolio {
            capital_base: self.capital_base,
            starting_cash: self.cumulative.starting_cash,
            cash: self.cash,
            positions: self
                .positions
                .iter()
                .filter(|(_, p)| !p.is_flat())
                .map(|(sid, p)| (sid.clone(), p.clone()))
                .collect(),
            positions_value,
            portfolio_value,
            pnl: self.cumulative.pnl(self.cash, positions_value),
            returns: self.cumulative.returns(self.cash, positions_value),
            capital_used: self.cumulative.capital_used,
            start_date: Some(self.start_date),
        }
    }

    /// Cumulative return since the start of the run
    pub fn returns(&self) -> f64 {
        self.cumulative.returns(self.cash, self.positions_value())
    }

    /// Period spanning the whole run
    pub fn cumulative_performance(&self) -> &PerformancePeriod {
        &self.cumulative
    }

    pub fn cumulative_risk_metrics(&self) -> &RiskMetricsCumulative {
        &self.risk
    }

    /// Number of closed trading days
    pub fn trading_days(&self) -> usize {
        self.days
    }
}
