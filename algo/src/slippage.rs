//! Slippage and commission models

use crate::types::{Order, TradeBar};
use serde::{Deserialize, Serialize};

/// Decides how much of an order fills against a bar, and at what price
pub trait SlippageModel: Send + Sync {
    /// Simulate a fill for `order` against `bar`
    ///
    /// `volume_used` is the number of shares already filled against this bar
    /// for the same sid. Returns the fill price and signed fill amount, or
    /// `None` if nothing fills.
    fn process_order(&self, order: &Order, bar: &TradeBar, volume_used: f64) -> Option<(f64, i64)>;

    /// Model name for logs
    fn name(&self) -> &'static str;
}

/// Reject fill prices that violate the order's limit
fn respects_limit(order: &Order, price: f64) -> bool {
    match order.limit {
        Some(limit) if order.direction() > 0 => price <= limit,
        Some(limit) => price >= limit,
        None => true,
    }
}

/// Fill the whole open amount at the trade price shifted by half a spread
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedSlippage {
    pub spread: f64,
}

impl FixedSlippage {
    pub fn new(spread: f64) -> Self {
        Self { spread }
    }
}

impl SlippageModel for FixedSlippage {
    fn process_order(&self, order: &Order, bar: &TradeBar, _volume_used: f64) -> Option<(f64, i64)> {
        let amount = order.open_amount();
        if amount == 0 {
            return None;
        }

        // Buyers pay up, sellers receive less
        let price = bar.price + order.direction() as f64 * self.spread / 2.0;
        respects_limit(order, price).then_some((price, amount))
    }

    fn name(&self) -> &'static str {
        "FixedSlippage"
    }
}

/// Fill at most a share of each bar's volume with quadratic price impact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeShareSlippage {
    /// Maximum fraction of bar volume filled across all orders
    pub volume_limit: f64,
    /// Impact coefficient applied to the squared volume share
    pub price_impact: f64,
}

impl Default for VolumeShareSlippage {
    fn default() -> Self {
        Self {
            volume_limit: 0.25,
            price_impact: 0.1,
        }
    }
}

impl SlippageModel for VolumeShareSlippage {
    fn process_order(&self, order: &Order, bar: &TradeBar, volume_used: f64) -> Option<(f64, i64)> {
        if bar.volume <= 0.0 {
            return None;
        }

        let max_volume = self.volume_limit * bar.volume;
        let remaining = (max_volume - volume_used).floor();
        if remaining < 1.0 {
            return None;
        }

        let open = order.open_amount().abs();
        let shares = open.min(remaining as i64);
        if shares == 0 {
            return None;
        }

        let volume_share = ((volume_used + shares as f64) / bar.volume).min(self.volume_limit);
        let impact = volume_share.powi(2) * self.price_impact * bar.price;
        let price = bar.price + order.direction() as f64 * impact;

        respects_limit(order, price).then_some((price, order.direction() * shares))
    }

    fn name(&self) -> &'static str {
        "VolumeShareSlippage"
    }
}

/// Serializable slippage configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SlippageConfig {
    Fixed {
        #[serde(default)]
        spread: f64,
    },
    VolumeShare {
        #[serde(default = "default_volume_limit")]
        volume_limit: f64,
        #[serde(default = "default_price_impact")]
        price_impact: f64,
    },
}

fn default_volume_limit() -> f64 {
    VolumeShareSlippage::default().volume_limit
}

fn default_price_impact() -> f64 {
    VolumeShareSlippage::default().price_impact
}

impl Default for SlippageConfig {
    fn default() -> Self {
        SlippageConfig::Fixed { spread: 0.0 }
    }
}

impl SlippageConfig {
    pub fn build(&self) -> Box<dyn SlippageModel> {
        match *self {
            SlippageConfig::Fixed { spread } => Box::new(FixedSlippage::new(spread)),
            SlippageConfig::VolumeShare { volume_limit, price_impact } => {
                Box::new(VolumeShareSlippage { volume_limit, price_impact })
            }
        }
    }
}

/// Commission charged on fills
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommissionModel {
    /// Fixed cost per share filled
    PerShare { cost: f64 },
    /// Fixed cost per order, charged on its first fill
    PerTrade { cost: f64 },
    /// No commission
    Zero,
}

impl Default for CommissionModel {
    fn default() -> Self {
        CommissionModel::PerShare { cost: 0.03 }
    }
}

impl CommissionModel {
    /// Commission for filling `amount` shares of `order`
    pub fn calculate(&self, order: &Order, amount: i64) -> f64 {
        match *self {
            CommissionModel::PerShare { cost } => amount.abs() as f64 * cost,
            CommissionModel::PerTrade { cost } => {
                if order.filled == 0 {
                    cost
                } else {
                    0.0
                }
            }
            CommissionModel::Zero => 0.0,
        }
    }
}
