//! # tickline-algo: Event-Driven Backtesting Engine
//!
//! This library runs trading algorithms against historical or synthetic bar
//! data and reports daily performance and cumulative risk.
//!
//! ## Core Components
//!
//! - **Algorithm Trait**: Callbacks every algorithm implements
//! - **AlgoContext**: Order placement, portfolio and time access for algorithms
//! - **TradingAlgorithm**: Runner that configures and drives a simulation
//! - **SimulatedTrading**: The event loop (fills, marking, transforms, callbacks)
//! - **Sources and Transforms**: Bar frames, event sources, stateful indicators
//! - **Slippage, Blotter, Performance**: Fill simulation and accounting
//! - **Optimisation**: Grid search over algorithm parameters
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tickline_algo::library::BuySellAlgorithm;
//! use tickline_algo::{BarFrame, TradingAlgorithm};
//!
//! # async fn example() -> tickline_algo::AlgoResult<()> {
//! let frame = BarFrame::read_csv("bars.csv")?;
//!
//! let mut runner = TradingAlgorithm::new(BuySellAlgorithm::new("LUV", 100, 0));
//! let stats = runner.run(&frame).await?;
//!
//! if let Some(tracker) = runner.perf_tracker() {
//!     println!("Return: {}", tracker.returns());
//!     println!("Max drawdown: {}", tracker.cumulative_risk_metrics().calculate_max_drawdown());
//! }
//! println!("{} trading days", stats.len());
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod blotter;
pub mod context;
pub mod environment;
pub mod error;
pub mod library;
pub mod optimize;
pub mod performance;
pub mod simulation;
pub mod slippage;
pub mod source;
pub mod transforms;
pub mod types;

// Re-export main types
pub use algorithm::{Algorithm, DailyStats, TradingAlgorithm};
pub use blotter::Blotter;
pub use context::AlgoContext;
pub use environment::{create_trading_environment, TradingEnvironment};
pub use error::{AlgoError, AlgoResult};
pub use optimize::{grid_search, OptimizationRun};
pub use performance::{DailyPerf, PerformancePeriod, PerformanceTracker};
pub use simulation::{PerfMessage, SimulatedTrading};
pub use slippage::{
    CommissionModel, FixedSlippage, SlippageConfig, SlippageModel, VolumeShareSlippage,
};
pub use source::{
    merge_sources, BarFrame, DataFrameSource, EventSource, OhlcvBar, ReplaySource, UpDownSource,
};
pub use transforms::{StatefulTransform, Transform, TransformFactory, TransformSpec};
pub use types::{
    AlgoParams, AlgorithmMetadata, BarData, Order, OrderId, OrderStatus, Portfolio, Position,
    Sid, SidData, TradeBar, Transaction,
};
