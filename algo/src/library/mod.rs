//! Example algorithms

pub mod buy_sell;
pub mod rebalance;

pub use buy_sell::BuySellAlgorithm;
pub use rebalance::{RebalanceAlgorithm, RebalanceConfig};
