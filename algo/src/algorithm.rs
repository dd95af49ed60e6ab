//! Algorithm trait and runner

use crate::context::AlgoContext;
use crate::environment::{create_trading_environment, DEFAULT_CAPITAL_BASE};
use crate::error::{AlgoError, AlgoResult};
use crate::performance::{DailyPerf, PerformanceTracker};
use crate::simulation::{PerfMessage, SimulatedTrading};
use crate::slippage::{CommissionModel, FixedSlippage, SlippageModel};
use crate::source::{merge_sources, BarFrame, DataFrameSource, EventSource, ReplaySource};
use crate::transforms::{StatefulTransform, TransformFactory, TransformSpec};
use crate::types::{AlgoParams, AlgorithmMetadata, BarData, Sid, Transaction};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tickline_risk::{RiskEngine, RiskReport};

/// Base trait all trading algorithms implement
///
/// The simulation calls these hooks; orders and portfolio access go through
/// the [`AlgoContext`].
#[async_trait]
pub trait Algorithm: Send {
    /// Called once before the first event
    async fn initialize(&mut self, ctx: &mut AlgoContext) -> AlgoResult<()>;

    /// Called once per timestamp after all its events were processed
    async fn handle_data(&mut self, ctx: &mut AlgoContext, data: &BarData) -> AlgoResult<()>;

    /// Called for every fill of one of this algorithm's orders
    async fn on_fill(&mut self, _txn: &Transaction, _ctx: &mut AlgoContext) -> AlgoResult<()> {
        Ok(())
    }

    /// Called once after the last event
    async fn analyze(&mut self, _ctx: &mut AlgoContext) -> AlgoResult<()> {
        Ok(())
    }

    /// Sids the algorithm wants to receive
    fn sid_filter(&self) -> Vec<Sid> {
        self.metadata().sids
    }

    fn metadata(&self) -> AlgorithmMetadata;
}

/// Daily results of a run plus the final risk summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyStats {
    pub days: Vec<DailyPerf>,
    pub risk: Option<RiskReport>,
}

impl DailyStats {
    /// Split simulation output into daily records and the risk report
    pub fn from_messages(messages: Vec<PerfMessage>) -> Self {
        let mut stats = Self::default();
        for message in messages {
            match message {
                PerfMessage::Daily(perf) => stats.days.push(perf),
                PerfMessage::Risk(report) => stats.risk = Some(report),
            }
        }
        stats
    }

    /// Daily returns indexed by period close
    pub fn returns(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.days.iter().map(|d| (d.period_close, d.returns)).collect()
    }

    /// End-of-day portfolio values indexed by period close
    pub fn portfolio_values(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.days
            .iter()
            .map(|d| (d.period_close, d.portfolio_value))
            .collect()
    }

    pub fn last(&self) -> Option<&DailyPerf> {
        self.days.last()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Configures and runs one algorithm
///
/// Holds the sids, transforms, slippage, commission and trading controls used
/// to build a [`SimulatedTrading`] for every run.
pub struct TradingAlgorithm<A: Algorithm> {
    algo: A,
    sids: Vec<Sid>,
    transforms: IndexMap<String, TransformFactory>,
    slippage: Arc<dyn SlippageModel>,
    commission: CommissionModel,
    capital_base: f64,
    risk_free_rate: f64,
    risk_engine: Arc<Mutex<RiskEngine>>,
    benchmark: Option<Sid>,
    params: AlgoParams,
    perf_tracker: Option<PerformanceTracker>,
}

impl<A: Algorithm> TradingAlgorithm<A> {
    pub fn new(algo: A) -> Self {
        Self {
            algo,
            sids: Vec::new(),
            transforms: IndexMap::new(),
            slippage: Arc::new(FixedSlippage::default()),
            commission: CommissionModel::default(),
            capital_base: DEFAULT_CAPITAL_BASE,
            risk_free_rate: 0.0,
            risk_engine: Arc::new(Mutex::new(RiskEngine::permissive())),
            benchmark: None,
            params: AlgoParams::new(),
            perf_tracker: None,
        }
    }

    /// Register a transform under `tag`, replacing any previous one
    pub fn add_transform(&mut self, tag: impl Into<String>, factory: TransformFactory) -> &mut Self {
        let tag = tag.into();
        if self.transforms.insert(tag.clone(), factory).is_some() {
            tracing::debug!(tag = %tag, "Replaced transform");
        }
        self
    }

    /// Register a built-in transform from its description
    pub fn add_transform_spec(&mut self, tag: impl Into<String>, spec: &TransformSpec) -> AlgoResult<&mut Self> {
        let factory = spec.factory()?;
        Ok(self.add_transform(tag, factory))
    }

    pub fn set_sids(&mut self, sids: Vec<Sid>) -> &mut Self {
        self.sids = sids;
        self
    }

    pub fn set_slippage(&mut self, slippage: Box<dyn SlippageModel>) -> &mut Self {
        self.slippage = Arc::from(slippage);
        self
    }

    pub fn set_commission(&mut self, commission: CommissionModel) -> &mut Self {
        self.commission = commission;
        self
    }

    pub fn set_capital_base(&mut self, capital_base: f64) -> &mut Self {
        self.capital_base = capital_base;
        self
    }

    /// Annual risk-free rate for Sharpe, Sortino and alpha
    pub fn set_risk_free_rate(&mut self, rate: f64) -> &mut Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn set_risk_engine(&mut self, risk_engine: RiskEngine) -> &mut Self {
        self.risk_engine = Arc::new(Mutex::new(risk_engine));
        self
    }

    pub fn set_benchmark(&mut self, sid: Option<Sid>) -> &mut Self {
        self.benchmark = sid;
        self
    }

    pub fn set_params(&mut self, params: AlgoParams) -> &mut Self {
        self.params = params;
        self
    }

    /// Explicitly configured sids, else the algorithm's own filter
    pub fn sid_filter(&self) -> Vec<Sid> {
        if self.sids.is_empty() {
            self.algo.sid_filter()
        } else {
            self.sids.clone()
        }
    }

    pub fn algorithm(&self) -> &A {
        &self.algo
    }

    pub fn algorithm_mut(&mut self) -> &mut A {
        &mut self.algo
    }

    /// Shared handle to the trading controls
    pub fn risk_engine(&self) -> Arc<Mutex<RiskEngine>> {
        Arc::clone(&self.risk_engine)
    }

    /// Tracker of the most recent run
    pub fn perf_tracker(&self) -> Option<&PerformanceTracker> {
        self.perf_tracker.as_ref()
    }

    /// Run over the sids of a bar frame
    pub async fn run(&mut self, frame: &BarFrame) -> AlgoResult<DailyStats> {
        if frame.is_empty() {
            return Err(AlgoError::SourceNotSet);
        }
        let mut sids = self.sid_filter();
        if sids.is_empty() {
            return Err(AlgoError::SidsNotSet);
        }
        // The benchmark needs its own price stream
        if let Some(benchmark) = &self.benchmark {
            if !sids.contains(benchmark) {
                sids.push(benchmark.clone());
            }
        }

        let source = DataFrameSource::new(frame.clone(), &sids);
        self.run_sources(vec![Box::new(source)]).await
    }

    /// Run over explicit event sources
    pub async fn run_sources(&mut self, sources: Vec<Box<dyn EventSource>>) -> AlgoResult<DailyStats> {
        if sources.is_empty() {
            return Err(AlgoError::SourceNotSet);
        }
        if self.sid_filter().is_empty() {
            return Err(AlgoError::SidsNotSet);
        }

        let events = merge_sources(sources);
        let (start, end) = match (events.first(), events.last()) {
            (Some(first), Some(last)) => (first.dt, last.dt),
            _ => return Err(AlgoError::SourceNotSet),
        };

        let environment = create_trading_environment(start, end)?
            .with_capital_base(self.capital_base)
            .with_risk_free_rate(self.risk_free_rate)
            .with_benchmark(self.benchmark.clone());

        let transforms = self
            .transforms
            .iter()
            .map(|(tag, factory)| StatefulTransform::new(tag.clone(), Arc::clone(factory)))
            .collect();

        let mut simulation = SimulatedTrading::new(
            vec![Box::new(ReplaySource::new(events))],
            transforms,
            environment,
            Arc::clone(&self.slippage),
            self.commission,
            Arc::clone(&self.risk_engine),
        )
        .with_params(self.params.clone());

        let messages = simulation.run(&mut self.algo).await?;
        self.perf_tracker = Some(simulation.into_tracker());

        Ok(DailyStats::from_messages(messages))
    }
}
