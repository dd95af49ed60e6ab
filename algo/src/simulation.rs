//! Simulation loop
//!
//! [`SimulatedTrading`] drives one algorithm through the merged event stream
//! of its sources. For every timestamp it fills open orders, marks prices,
//! updates transforms and then calls `handle_data` once. Day boundaries are
//! UTC dates; each closed day produces a [`PerfMessage::Daily`].

use crate::algorithm::Algorithm;
use crate::context::AlgoContext;
use crate::environment::TradingEnvironment;
use crate::error::AlgoResult;
use crate::performance::{DailyPerf, PerformanceTracker};
use crate::slippage::{CommissionModel, SlippageModel};
use crate::source::{merge_sources, EventSource};
use crate::transforms::StatefulTransform;
use crate::types::{AlgoParams, BarData};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tickline_risk::{RiskEngine, RiskReport};

/// Output of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PerfMessage {
    /// One closed trading day
    Daily(DailyPerf),
    /// Final risk summary, always the last message
    Risk(RiskReport),
}

/// Current trading day bounds
#[derive(Debug, Clone, Copy)]
struct OpenDay {
    date: NaiveDate,
    open: DateTime<Utc>,
    close: DateTime<Utc>,
}

/// Event-driven backtest of a single algorithm
pub struct SimulatedTrading {
    sources: Vec<Box<dyn EventSource>>,
    transforms: Vec<StatefulTransform>,
    environment: TradingEnvironment,
    slippage: Arc<dyn SlippageModel>,
    commission: CommissionModel,
    ctx: AlgoContext,
    tracker: PerformanceTracker,
    days_closed: usize,
}

impl SimulatedTrading {
    pub fn new(
        sources: Vec<Box<dyn EventSource>>,
        transforms: Vec<StatefulTransform>,
        environment: TradingEnvironment,
        slippage: Arc<dyn SlippageModel>,
        commission: CommissionModel,
        risk_engine: Arc<Mutex<RiskEngine>>,
    ) -> Self {
        let ctx = AlgoContext::new(risk_engine, environment.exchange_tz, AlgoParams::new());
        let tracker = PerformanceTracker::new(&environment);

        Self {
            sources,
            transforms,
            environment,
            slippage,
            commission,
            ctx,
            tracker,
            days_closed: 0,
        }
    }

    /// Parameters visible to the algorithm through its context
    pub fn with_params(mut self, params: AlgoParams) -> Self {
        self.ctx.params = params;
        self
    }

    pub fn environment(&self) -> &TradingEnvironment {
        &self.environment
    }

    pub fn context(&self) -> &AlgoContext {
        &self.ctx
    }

    pub fn perf_tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    /// Consume the simulation, keeping its tracker
    pub fn into_tracker(self) -> PerformanceTracker {
        self.tracker
    }

    /// Run the algorithm over every event of every source
    pub async fn run<A>(&mut self, algo: &mut A) -> AlgoResult<Vec<PerfMessage>>
    where
        A: Algorithm + ?Sized,
    {
        let metadata = algo.metadata();
        tracing::info!(
            algorithm = %metadata.name,
            start = %self.environment.period_start,
            end = %self.environment.period_end,
            capital_base = self.environment.capital_base,
            slippage = self.slippage.name(),
            "Starting simulation"
        );

        self.ctx.set_portfolio(self.tracker.portfolio());
        algo.initialize(&mut self.ctx).await?;

        let events = merge_sources(std::mem::take(&mut self.sources));
        let mut messages = Vec::new();
        let mut bar_data = BarData::new();
        let mut day: Option<OpenDay> = None;

        let mut i = 0;
        while i < events.len() {
            let dt = events[i].dt;
            let date = dt.date_naive();

            day = match day {
                Some(current) if current.date == date => Some(OpenDay { close: dt, ..current }),
                Some(current) => {
                    messages.push(PerfMessage::Daily(self.close_day(current)));
                    Some(OpenDay { date, open: dt, close: dt })
                }
                None => Some(OpenDay { date, open: dt, close: dt }),
            };
            self.ctx.set_datetime(dt);

            while i < events.len() && events[i].dt == dt {
                let bar = &events[i];

                let transactions = self.ctx.blotter_mut().process_trade(
                    bar,
                    self.slippage.as_ref(),
                    &self.commission,
                );
                for txn in &transactions {
                    self.tracker.process_transaction(txn);
                }
                if !transactions.is_empty() {
                    self.ctx.set_portfolio(self.tracker.portfolio());
                    for txn in &transactions {
                        algo.on_fill(txn, &mut self.ctx).await?;
                    }
                }

                self.tracker.update_price(&bar.sid, bar.price, bar.dt);
                self.ctx.update_price(&bar.sid, bar.price);

                let outputs: HashMap<String, f64> = self
                    .transforms
                    .iter_mut()
                    .filter_map(|t| t.update(bar).map(|value| (t.tag().to_string(), value)))
                    .collect();
                bar_data.update(bar.clone(), outputs);

                i += 1;
            }

            self.ctx.set_portfolio(self.tracker.portfolio());
            algo.handle_data(&mut self.ctx, &bar_data).await?;
        }

        if let Some(current) = day {
            messages.push(PerfMessage::Daily(self.close_day(current)));
        }

        self.ctx.set_portfolio(self.tracker.portfolio());
        algo.analyze(&mut self.ctx).await?;

        let report = self.tracker.cumulative_risk_metrics().report();
        tracing::info!(
            algorithm = %metadata.name,
            events = events.len(),
            trading_days = report.trading_days,
            period_return = report.algorithm_period_return,
            max_drawdown = report.max_drawdown,
            "Simulation finished"
        );
        messages.push(PerfMessage::Risk(report));

        Ok(messages)
    }

    fn close_day(&mut self, day: OpenDay) -> DailyPerf {
        // Orders from `initialize` are reported with the first day
        let mut orders = if self.days_closed == 0 {
            self.ctx.blotter().orders_on(DateTime::<Utc>::MIN_UTC.date_naive())
        } else {
            Vec::new()
        };
        orders.extend(self.ctx.blotter().orders_on(day.date));
        self.days_closed += 1;

        let recorded_vars = self.ctx.take_recorded_vars();
        self.tracker
            .handle_market_close(day.open, day.close, orders, recorded_vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;
    use crate::environment::create_trading_environment;
    use crate::slippage::FixedSlippage;
    use crate::source::UpDownSource;
    use crate::transforms::TransformSpec;
    use crate::types::{AlgorithmMetadata, Transaction};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    /// Buys once on the first bar and records what it sees
    #[derive(Default)]
    struct BuyOnce {
        handled: usize,
        fills: Vec<Transaction>,
        mavg: Vec<Option<f64>>,
        analyzed: bool,
    }

    #[async_trait]
    impl Algorithm for BuyOnce {
        async fn initialize(&mut self, _ctx: &mut AlgoContext) -> AlgoResult<()> {
            Ok(())
        }

        async fn handle_data(&mut self, ctx: &mut AlgoContext, data: &BarData) -> AlgoResult<()> {
            if self.handled == 0 {
                ctx.order("LUV", 100)?;
            }
            self.handled += 1;
            self.mavg.push(data.transform("LUV", "mavg"));
            ctx.record("price", data.price("LUV").unwrap_or_default());
            Ok(())
        }

        async fn on_fill(&mut self, txn: &Transaction, _ctx: &mut AlgoContext) -> AlgoResult<()> {
            self.fills.push(txn.clone());
            Ok(())
        }

        async fn analyze(&mut self, _ctx: &mut AlgoContext) -> AlgoResult<()> {
            self.analyzed = true;
            Ok(())
        }

        fn metadata(&self) -> AlgorithmMetadata {
            AlgorithmMetadata {
                name: "BuyOnce".to_string(),
                version: "1.0.0".to_string(),
                description: "Test algorithm".to_string(),
                sids: vec!["LUV".to_string()],
            }
        }
    }

    fn simulation(count: usize) -> SimulatedTrading {
        let start = Utc.with_ymd_and_hms(2013, 1, 2, 21, 0, 0).unwrap();
        let source = UpDownSource::new("LUV", start, Duration::days(1), count, 10.0, 1.0);
        let env = create_trading_environment(start, start + Duration::days(count as i64))
            .unwrap()
            .with_capital_base(10_000.0);

        let factory = TransformSpec::MovingAverage { window: 2 }.factory().unwrap();
        SimulatedTrading::new(
            vec![Box::new(source)],
            vec![StatefulTransform::new("mavg", factory)],
            env,
            Arc::new(FixedSlippage::default()),
            CommissionModel::Zero,
            Arc::new(Mutex::new(RiskEngine::permissive())),
        )
    }

    #[tokio::test]
    async fn test_daily_messages_and_final_report() {
        let mut sim = simulation(4);
        let mut algo = BuyOnce::default();

        let messages = sim.run(&mut algo).await.unwrap();
        assert_eq!(messages.len(), 5);
        assert!(matches!(messages.last(), Some(PerfMessage::Risk(_))));

        assert_eq!(algo.handled, 4);
        assert!(algo.analyzed);
        assert_eq!(algo.mavg, vec![None, Some(10.5), Some(10.5), Some(10.5)]);

        // Ordered on day one at 10, filled on day two at 11
        assert_eq!(algo.fills.len(), 1);
        assert_eq!(algo.fills[0].price, 11.0);

        let daily: Vec<&DailyPerf> = messages
            .iter()
            .filter_map(|m| match m {
                PerfMessage::Daily(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(daily[0].orders.len(), 1);
        assert_eq!(daily[1].transactions.len(), 1);
        assert_eq!(daily[1].recorded_vars.get("price"), Some(&11.0));
        // Holding 100 shares that drop from 11 to 10
        assert!((daily[2].pnl + 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_sources_still_report() {
        let mut sim = simulation(0);
        let mut algo = BuyOnce::default();

        let messages = sim.run(&mut algo).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(algo.handled, 0);
        assert!(algo.analyzed);
    }
}
