//! Core types for the backtesting engine

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Instrument identifier (ticker symbol)
pub type Sid = String;

/// Unique identifier for an order
pub type OrderId = String;

/// Volume assigned to bars built from a bare price
pub const DEFAULT_BAR_VOLUME: f64 = 1000.0;

/// One trade event for one sid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeBar {
    pub sid: Sid,
    pub dt: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Trade price used for fills and marking
    pub price: f64,
}

impl TradeBar {
    /// Build a flat bar from a single trade price
    pub fn from_price(sid: impl Into<Sid>, dt: DateTime<Utc>, price: f64) -> Self {
        Self {
            sid: sid.into(),
            dt,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: DEFAULT_BAR_VOLUME,
            price,
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order is resting in the blotter (possibly partially filled)
    Open,
    /// Order fully filled
    Filled,
    /// Order cancelled
    Cancelled,
    /// Order blocked by trading controls, never placed
    Rejected,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Order placed by an algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub sid: Sid,
    /// Placement time; the order is eligible for fills strictly after it
    pub dt: DateTime<Utc>,
    /// Signed share amount (+buy, -sell)
    pub amount: i64,
    /// Signed shares filled so far
    pub filled: i64,
    pub limit: Option<f64>,
    pub stop: Option<f64>,
    /// Whether the stop price has been crossed
    pub stop_reached: bool,
    pub status: OrderStatus,
    /// Commission charged so far
    pub commission: f64,
}

impl Order {
    /// Create an open market order
    pub fn market(sid: impl Into<Sid>, amount: i64, dt: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            sid: sid.into(),
            dt,
            amount,
            filled: 0,
            limit: None,
            stop: None,
            stop_reached: false,
            status: OrderStatus::Open,
            commission: 0.0,
        }
    }

    /// Shares still to fill (signed)
    pub fn open_amount(&self) -> i64 {
        self.amount - self.filled
    }

    /// +1 for buys, -1 for sells
    pub fn direction(&self) -> i64 {
        if self.amount >= 0 {
            1
        } else {
            -1
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Update stop state for a trade price and report whether the order may fill
    ///
    /// Buy stops trigger at or above the stop price, sell stops at or below.
    /// Buy limits fill at or below the limit, sell limits at or above.
    pub fn check_triggers(&mut self, price: f64) -> bool {
        let buying = self.direction() > 0;

        if let Some(stop) = self.stop {
            if !self.stop_reached {
                self.stop_reached = if buying { price >= stop } else { price <= stop };
            }
            if !self.stop_reached {
                return false;
            }
        }

        match self.limit {
            Some(limit) if buying => price <= limit,
            Some(limit) => price >= limit,
            None => true,
        }
    }
}

/// Executed fill of (part of) an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sid: Sid,
    /// Signed share amount
    pub amount: i64,
    pub price: f64,
    pub dt: DateTime<Utc>,
    pub order_id: OrderId,
    pub commission: f64,
}

impl Transaction {
    /// Cash impact excluding commission (negative for buys)
    pub fn cash_flow(&self) -> f64 {
        -(self.amount as f64) * self.price
    }
}

/// Position in one sid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub sid: Sid,
    /// Shares held (positive = long, negative = short)
    pub amount: i64,
    /// Average price paid for the current holding
    pub cost_basis: f64,
    pub last_sale_price: f64,
    pub last_sale_date: Option<DateTime<Utc>>,
}

impl Position {
    /// Create a new empty position
    pub fn new(sid: impl Into<Sid>) -> Self {
        Self {
            sid: sid.into(),
            amount: 0,
            cost_basis: 0.0,
            last_sale_price: 0.0,
            last_sale_date: None,
        }
    }

    pub fn market_value(&self) -> f64 {
        self.amount as f64 * self.last_sale_price
    }

    pub fn is_flat(&self) -> bool {
        self.amount == 0
    }

    pub fn is_long(&self) -> bool {
        self.amount > 0
    }

    pub fn is_short(&self) -> bool {
        self.amount < 0
    }

    /// Apply a fill to the holding
    ///
    /// Adding in the same direction averages the cost basis, reducing keeps it,
    /// flipping sides resets it to the fill price.
    pub fn apply_transaction(&mut self, txn: &Transaction) {
        let total = self.amount + txn.amount;

        if total == 0 {
            self.cost_basis = 0.0;
        } else if self.amount == 0 {
            self.cost_basis = txn.price;
        } else if self.amount.signum() == txn.amount.signum() {
            let cost = self.cost_basis * self.amount as f64 + txn.price * txn.amount as f64;
            self.cost_basis = cost / total as f64;
        } else if total.signum() != self.amount.signum() {
            self.cost_basis = txn.price;
        }

        self.amount = total;
        self.last_sale_price = txn.price;
        self.last_sale_date = Some(txn.dt);
    }

    /// Mark the position at a new trade price
    pub fn update_price(&mut self, price: f64, dt: DateTime<Utc>) {
        self.last_sale_price = price;
        self.last_sale_date = Some(dt);
    }
}

/// Read-only portfolio snapshot handed to algorithms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Portfolio {
    pub capital_base: f64,
    pub starting_cash: f64,
    pub cash: f64,
    pub positions: BTreeMap<Sid, Position>,
    pub positions_value: f64,
    pub portfolio_value: f64,
    pub pnl: f64,
    pub returns: f64,
    pub capital_used: f64,
    pub start_date: Option<DateTime<Utc>>,
}

impl Portfolio {
    /// Shares currently held in a sid
    pub fn position_amount(&self, sid: &str) -> i64 {
        self.positions.get(sid).map(|p| p.amount).unwrap_or(0)
    }
}

/// Latest bar for one sid plus the transform outputs computed on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidData {
    pub bar: TradeBar,
    /// Transform outputs keyed by tag; tags still warming up are absent
    pub transforms: HashMap<String, f64>,
}

/// Market snapshot handed to `handle_data`
///
/// Holds the latest bar for every sid seen so far, in first-seen order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarData {
    sids: IndexMap<Sid, SidData>,
}

impl BarData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for the bar's sid
    pub fn update(&mut self, bar: TradeBar, transforms: HashMap<String, f64>) {
        self.sids
            .insert(bar.sid.clone(), SidData { bar, transforms });
    }

    pub fn get(&self, sid: &str) -> Option<&SidData> {
        self.sids.get(sid)
    }

    pub fn contains(&self, sid: &str) -> bool {
        self.sids.contains_key(sid)
    }

    /// Latest trade price for a sid
    pub fn price(&self, sid: &str) -> Option<f64> {
        self.sids.get(sid).map(|d| d.bar.price)
    }

    /// Transform output for a sid, if warmed up
    pub fn transform(&self, sid: &str, tag: &str) -> Option<f64> {
        self.sids.get(sid)?.transforms.get(tag).copied()
    }

    pub fn sids(&self) -> impl Iterator<Item = &Sid> {
        self.sids.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Sid, &SidData)> {
        self.sids.iter()
    }

    pub fn len(&self) -> usize {
        self.sids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sids.is_empty()
    }
}

/// Algorithm metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    /// Sids this algorithm trades
    pub sids: Vec<Sid>,
}

/// Algorithm parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlgoParams {
    /// Parameter key-value map
    pub params: HashMap<String, String>,
}

impl AlgoParams {
    /// Create new empty parameters
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
        }
    }

    /// Get parameter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    /// Get parameter as typed value
    pub fn get_typed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.params.get(key).and_then(|s| s.parse().ok())
    }

    /// Set parameter value
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.insert(key.into(), value.to_string());
    }
}
